//! # Robomq - Single-Host Message Broker for Robotics Pipelines
//!
//! Robomq is a lightweight message-queue broker for robotics data
//! pipelines on a single host: teleoperation capture, policy inference
//! serving, and sensor fan-out between processes that share a machine.
//!
//! ## Features
//!
//! - **Per-topic message stores**: Bounded by wall-clock retention (TTL),
//!   not by count; stale messages evicted lazily at every access
//! - **Shared-memory payloads**: Ring-buffer arenas over POSIX shared
//!   memory with a generation protocol that detects overwritten reads
//! - **Request/reply**: FIFO correlation with condvar-based deadline
//!   waits; timeout is a normal outcome, not an error
//! - **Uniform envelopes**: One request/response shape for every verb at
//!   the transport boundary, bincode on the wire
//! - **Thread-safe**: Per-topic mutexes behind a read-mostly registry
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 Broker (per server)             │
//! ├─────────────────────────────────────────────────┤
//! │  Topic registry          │  Request broker      │
//! │  - TTL message stores    │  - incoming queue    │
//! │  - shm arenas            │  - answering queue   │
//! └─────────────────────────────────────────────────┘
//!           │                         │
//!           ▼                         ▼
//! ┌─────────────────┐    ┌─────────────────────────┐
//! │ Envelope layer  │    │    Rust Native API      │
//! │ (wire boundary) │    │    (direct access)      │
//! └─────────────────┘    └─────────────────────────┘
//! ```

// Core modules
pub mod arena;
pub mod clock;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod rpc;
pub mod server;
pub mod store;

// Main API re-exports
pub use arena::{segment_name, ShmArena, ShmArenaReader, ShmHandle, ShmSegment, ARENA_HEADER_SIZE};
pub use clock::{steady_clock_us, system_clock_us, BrokerClock};
pub use codec::Value;
pub use envelope::{
    dispatch, status_from_transport, RequestEnvelope, ResponseEnvelope, Verb,
};
pub use error::{RobomqError, Result};
pub use rpc::{PendingRequest, RequestBroker, RequestId, RequestState, TimedPayload};
pub use server::{Broker, TopicEntry, TopicId, TopicRegistry, STATUS_NO_TOPIC, STATUS_UNREACHABLE};
pub use store::{BackingMode, DataTopic, Order, PayloadRef, RetentionPolicy, TimedMessage};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration constants
pub mod config {
    /// Default retention window for topics (seconds)
    pub const DEFAULT_RETENTION_S: f64 = 10.0;

    /// Default shared-memory arena size (1MB)
    pub const DEFAULT_ARENA_SIZE: usize = 1024 * 1024;

    /// Default request timeout (seconds)
    pub const DEFAULT_REQUEST_TIMEOUT_S: f64 = 1.0;
}

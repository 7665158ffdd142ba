//! Per-topic message store with ordering and time-based eviction
//!
//! Each topic holds an ordered buffer of timestamped messages. Messages are
//! appended without backpressure and lazily evicted once they outlive the
//! topic's retention window. Payloads are either owned byte buffers (heap
//! topics) or handles into a shared-memory arena (shared-memory topics).

pub mod message;
pub mod topic;

pub use message::{Order, PayloadRef, TimedMessage};
pub use topic::{BackingMode, DataTopic, RetentionPolicy};

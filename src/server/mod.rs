//! Topic registry and the broker facade
//!
//! A server process owns one [`Broker`], which holds the process-wide
//! topic table, the request/reply queue and the broker clock. Per-topic
//! operations serialize on a per-topic mutex so different topics proceed
//! independently while operations on one topic are strictly ordered.

pub mod broker;
pub mod registry;

pub use broker::Broker;
pub use registry::{TopicEntry, TopicId, TopicRegistry};

/// Status sentinel: topic name is not registered
pub const STATUS_NO_TOPIC: i64 = -1;

/// Status sentinel: no response from the server within the transport
/// deadline (produced at the envelope boundary, never by the broker itself)
pub const STATUS_UNREACHABLE: i64 = -2;

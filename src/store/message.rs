//! Message types and payload references

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::arena::ShmHandle;
use crate::error::{RobomqError, Result};

/// Retrieval order for peek/pop operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    /// Oldest entries first, ascending sequence
    Earliest,
    /// Newest entries first, descending sequence
    Latest,
}

impl Order {
    /// Wire/CLI spelling of the order
    pub fn as_str(&self) -> &'static str {
        match self {
            Order::Earliest => "earliest",
            Order::Latest => "latest",
        }
    }

    /// Parse an order from its wire/CLI spelling
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "earliest" | "EARLIEST" => Ok(Order::Earliest),
            "latest" | "LATEST" => Ok(Order::Latest),
            other => Err(RobomqError::invalid_parameter(
                "order",
                format!("Invalid order: {}", other),
            )),
        }
    }
}

impl std::str::FromStr for Order {
    type Err = RobomqError;

    fn from_str(s: &str) -> Result<Self> {
        Order::parse(s)
    }
}

/// Payload reference - owned bytes or a shared-memory handle
///
/// Heap topics store the bytes inline behind an `Arc` so peeks hand out
/// cheap clones. Shared-memory topics store only the arena handle; the
/// bytes live in the mapped region and are resolved at read time.
#[derive(Debug, Clone)]
pub enum PayloadRef {
    /// Owned byte buffer
    Inline(Arc<Vec<u8>>),
    /// Handle into the topic's shared-memory arena
    Shm(ShmHandle),
}

impl PayloadRef {
    /// Create an inline payload from raw bytes
    pub fn inline(data: impl Into<Vec<u8>>) -> Self {
        PayloadRef::Inline(Arc::new(data.into()))
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        match self {
            PayloadRef::Inline(data) => data.len(),
            PayloadRef::Shm(handle) => handle.len as usize,
        }
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A stored message: per-topic sequence, broker timestamp, payload
#[derive(Debug, Clone)]
pub struct TimedMessage {
    /// Monotonically increasing sequence number, scoped per topic
    pub sequence: u64,
    /// Broker-clock timestamp in seconds at insertion
    pub timestamp: f64,
    /// Payload reference
    pub payload: PayloadRef,
}

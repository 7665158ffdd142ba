//! Pending request state

use std::sync::{Arc, Condvar, Mutex};

use crate::store::PayloadRef;

/// Correlation id for a pending request
pub type RequestId = u64;

/// Lifecycle of a pending request
///
/// `Created → Waiting → {Replied, TimedOut}`; timeout is the only form of
/// cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Built but not yet enqueued
    Created,
    /// Enqueued, requester blocked
    Waiting,
    /// Matched with a reply
    Replied,
    /// Deadline expired before a reply arrived
    TimedOut,
}

/// A request payload with its enqueue timestamp
#[derive(Debug, Clone)]
pub struct TimedPayload {
    /// Payload bytes or shared-memory handle
    pub payload: PayloadRef,
    /// Broker-clock timestamp in seconds
    pub timestamp: f64,
}

/// Per-request rendezvous slot the requester blocks on
#[derive(Debug)]
pub(crate) struct ReplySlot {
    pub(crate) state: Mutex<SlotState>,
    pub(crate) ready: Condvar,
}

#[derive(Debug)]
pub(crate) struct SlotState {
    pub(crate) state: RequestState,
    pub(crate) reply: Vec<Vec<u8>>,
}

impl ReplySlot {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SlotState {
                state: RequestState::Created,
                reply: Vec::new(),
            }),
            ready: Condvar::new(),
        })
    }
}

/// An outstanding request awaiting exactly one matching reply on its topic
#[derive(Debug)]
pub struct PendingRequest {
    /// Correlation id, unique per broker
    pub id: RequestId,
    /// Topic the request targets
    pub topic: String,
    /// Request payloads with enqueue timestamps
    pub payloads: Vec<TimedPayload>,
    /// Broker-clock enqueue time
    pub enqueued_at: f64,
    pub(crate) slot: Arc<ReplySlot>,
}

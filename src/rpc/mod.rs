//! Request/reply correlation over the broker's topics
//!
//! A synchronous RPC veneer on the otherwise asynchronous pub/sub
//! substrate: `request_with_data` suspends the caller until a matching
//! reply arrives or the deadline expires, `wait_for_request` hands the
//! server the oldest unanswered request, and `reply_request` wakes the
//! blocked requester. All waits use condvar wait-with-deadline, never
//! busy-polling, and deadline expiry yields an empty result rather than an
//! error.

pub mod broker;
pub mod pending;

pub use broker::RequestBroker;
pub use pending::{PendingRequest, RequestId, RequestState, TimedPayload};

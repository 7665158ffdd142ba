//! FIFO request queue with blocking wait and deadline expiry

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use log::{debug, warn};

use super::pending::{PendingRequest, ReplySlot, RequestId, RequestState, TimedPayload};

/// Unbounded timeouts (`Duration::MAX`) saturate to a deadline one year
/// out instead of overflowing `Instant` arithmetic
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(365 * 24 * 3600))
}

#[derive(Debug, Default)]
struct Queues {
    /// Requests not yet handed to a server via wait_for_request
    incoming: VecDeque<PendingRequest>,
    /// Requests a server has claimed but not yet replied to
    answering: VecDeque<PendingRequest>,
}

/// Correlates pending requests with replies, FIFO per topic
///
/// Requesters block on a per-request slot; servers block on the shared
/// arrival queue. Both waits are condvar-based with explicit deadlines.
#[derive(Debug)]
pub struct RequestBroker {
    queues: Mutex<Queues>,
    arrival: Condvar,
    next_id: AtomicU64,
}

impl RequestBroker {
    /// Create an empty broker
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(Queues::default()),
            arrival: Condvar::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of outstanding requests (unclaimed plus claimed)
    pub fn pending_count(&self) -> usize {
        let q = self.queues.lock().unwrap();
        q.incoming.len() + q.answering.len()
    }

    /// Enqueue a request and block until a reply arrives or `timeout`
    /// elapses; returns the reply payloads, empty on timeout
    pub fn request(
        &self,
        topic: &str,
        payloads: Vec<TimedPayload>,
        timeout: Duration,
        enqueued_at: f64,
    ) -> Vec<Vec<u8>> {
        let slot = ReplySlot::new();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        {
            let mut q = self.queues.lock().unwrap();
            slot.state.lock().unwrap().state = RequestState::Waiting;
            q.incoming.push_back(PendingRequest {
                id,
                topic: topic.to_string(),
                payloads,
                enqueued_at,
                slot: slot.clone(),
            });
        }
        self.arrival.notify_one();

        let deadline = deadline_after(timeout);
        let mut st = slot.state.lock().unwrap();
        while st.state == RequestState::Waiting {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (guard, _) = slot.ready.wait_timeout(st, deadline - now).unwrap();
            st = guard;
        }

        if st.state == RequestState::Replied {
            return std::mem::take(&mut st.reply);
        }

        st.state = RequestState::TimedOut;
        drop(st);
        self.remove(id);
        warn!("Request on topic `{}` timed out after {:?}", topic, timeout);
        Vec::new()
    }

    /// Block until the oldest unanswered request arrives or `timeout`
    /// elapses; `None` on expiry
    ///
    /// The returned request stays pending until a matching `reply` call.
    pub fn wait_for_request(&self, timeout: Duration) -> Option<(String, Vec<TimedPayload>)> {
        let deadline = deadline_after(timeout);
        let mut q = self.queues.lock().unwrap();
        loop {
            if let Some(req) = q.incoming.pop_front() {
                let result = (req.topic.clone(), req.payloads.clone());
                q.answering.push_back(req);
                return Some(result);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, _) = self.arrival.wait_timeout(q, deadline - now).unwrap();
            q = guard;
        }
    }

    /// Deliver `reply` to the oldest pending request on `topic`
    ///
    /// Returns false when no request is pending for the topic; the reply is
    /// dropped with a warning in that case.
    pub fn reply(&self, topic: &str, reply: Vec<Vec<u8>>) -> bool {
        let req = {
            let mut q = self.queues.lock().unwrap();
            let pos_answering = q.answering.iter().position(|r| r.topic == topic);
            let pos_incoming = q.incoming.iter().position(|r| r.topic == topic);
            match (pos_answering, pos_incoming) {
                (Some(a), Some(i)) => {
                    // Oldest across both queues by correlation id
                    if q.answering[a].id <= q.incoming[i].id {
                        q.answering.remove(a)
                    } else {
                        q.incoming.remove(i)
                    }
                }
                (Some(a), None) => q.answering.remove(a),
                (None, Some(i)) => q.incoming.remove(i),
                (None, None) => None,
            }
        };

        let req = match req {
            Some(req) => req,
            None => {
                warn!(
                    "Dropping reply for topic `{}`: no pending request",
                    topic
                );
                return false;
            }
        };

        let mut st = req.slot.state.lock().unwrap();
        st.state = RequestState::Replied;
        st.reply = reply;
        req.slot.ready.notify_one();
        debug!("Replied to request {} on topic `{}`", req.id, topic);
        true
    }

    /// Drop a request from both queues (timeout cleanup)
    fn remove(&self, id: RequestId) {
        let mut q = self.queues.lock().unwrap();
        q.incoming.retain(|r| r.id != id);
        q.answering.retain(|r| r.id != id);
    }
}

impl Default for RequestBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PayloadRef;
    use std::sync::Arc;
    use std::thread;

    fn payload(bytes: &[u8]) -> Vec<TimedPayload> {
        vec![TimedPayload {
            payload: PayloadRef::inline(bytes.to_vec()),
            timestamp: 0.0,
        }]
    }

    #[test]
    fn test_request_reply_round_trip() {
        let broker = Arc::new(RequestBroker::new());

        let server = {
            let broker = broker.clone();
            thread::spawn(move || {
                let (topic, payloads) =
                    broker.wait_for_request(Duration::from_secs(2)).unwrap();
                assert_eq!(topic, "policy");
                assert_eq!(payloads.len(), 1);
                assert!(broker.reply("policy", vec![b"action".to_vec()]));
            })
        };

        let reply = broker.request("policy", payload(b"obs"), Duration::from_secs(2), 0.0);
        assert_eq!(reply, vec![b"action".to_vec()]);
        server.join().unwrap();
        assert_eq!(broker.pending_count(), 0);
    }

    #[test]
    fn test_request_timeout_returns_empty() {
        let broker = RequestBroker::new();
        let start = Instant::now();
        let reply = broker.request("nobody", payload(b"x"), Duration::from_millis(150), 0.0);
        let elapsed = start.elapsed();

        assert!(reply.is_empty());
        assert!(elapsed >= Duration::from_millis(140));
        assert!(elapsed < Duration::from_secs(2));
        assert_eq!(broker.pending_count(), 0);
    }

    #[test]
    fn test_wait_for_request_timeout() {
        let broker = RequestBroker::new();
        let start = Instant::now();
        assert!(broker.wait_for_request(Duration::from_millis(100)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[test]
    fn test_reply_without_pending_is_dropped() {
        let broker = RequestBroker::new();
        assert!(!broker.reply("ghost", vec![b"late".to_vec()]));
    }

    #[test]
    fn test_reply_matches_only_its_topic() {
        let broker = Arc::new(RequestBroker::new());

        let requester = {
            let broker = broker.clone();
            thread::spawn(move || {
                broker.request("a", payload(b"1"), Duration::from_secs(2), 0.0)
            })
        };

        // Wait until the request is queued
        while broker.pending_count() == 0 {
            thread::sleep(Duration::from_millis(5));
        }

        assert!(!broker.reply("b", vec![b"wrong".to_vec()]));
        assert!(broker.reply("a", vec![b"right".to_vec()]));
        assert_eq!(requester.join().unwrap(), vec![b"right".to_vec()]);
    }
}

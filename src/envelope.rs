//! Logical request/response envelopes at the transport boundary
//!
//! The network transport (socket framing, `tcp://`/`ipc://` endpoint
//! setup) is an external collaborator. This module fixes the contract it
//! carries: a bincode-encoded request envelope in, a bincode-encoded
//! response envelope out, with [`dispatch`] mapping one onto a broker.
//! Per-verb argument validation mirrors the broker-side checks so a
//! malformed envelope is answered with an error string instead of being
//! half-applied.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RobomqError, Result};
use crate::server::{Broker, STATUS_UNREACHABLE};
use crate::store::Order;

/// Operation selector carried in a request envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verb {
    Put,
    Peek,
    Pop,
    Status,
    Request,
    Reply,
    WaitForRequest,
    AddTopic,
    AddSharedMemoryTopic,
}

/// Request envelope
///
/// `count` follows the peek/pop convention (`< 0` or absent = all).
/// `AddTopic` packs its retention seconds as 8 payload bytes and
/// `AddSharedMemoryTopic` appends the arena size as 8 more, keeping the
/// envelope shape identical across verbs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub topic: String,
    pub verb: Verb,
    pub order: Option<Order>,
    pub count: Option<i32>,
    pub payload: Option<Vec<u8>>,
    pub timeout_s: Option<f64>,
}

impl RequestEnvelope {
    /// Encode to bincode bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode from bincode bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResponseEnvelope {
    /// Payload copies with their timestamps (peek/pop/request)
    Data {
        payloads: Vec<Vec<u8>>,
        timestamps: Vec<f64>,
    },
    /// A claimed request handed to the server (wait_for_request)
    Request {
        payloads: Vec<Vec<u8>>,
        topic: String,
    },
    /// Retained-count status for one topic
    Count { count: i64 },
    /// Retained-count status for every topic
    Topics { counts: Vec<(String, i64)> },
    /// Verb applied, nothing to return
    Ok,
    /// Structural misuse, reported synchronously
    Error { message: String },
}

impl ResponseEnvelope {
    /// Encode to bincode bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode from bincode bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    fn error(message: impl Into<String>) -> Self {
        ResponseEnvelope::Error {
            message: message.into(),
        }
    }
}

/// Pack retention seconds for an `AddTopic` payload
pub fn pack_retention(retention_s: f64) -> Vec<u8> {
    retention_s.to_le_bytes().to_vec()
}

/// Pack retention seconds and arena size for `AddSharedMemoryTopic`
pub fn pack_shared_topic(retention_s: f64, size_bytes: u64) -> Vec<u8> {
    let mut out = retention_s.to_le_bytes().to_vec();
    out.extend_from_slice(&size_bytes.to_le_bytes());
    out
}

fn unpack_f64(bytes: &[u8]) -> Result<f64> {
    let arr: [u8; 8] = bytes.try_into().map_err(|_| {
        RobomqError::invalid_parameter("payload", "Expected exactly 8 bytes for a float")
    })?;
    Ok(f64::from_le_bytes(arr))
}

fn unpack_u64(bytes: &[u8]) -> Result<u64> {
    let arr: [u8; 8] = bytes.try_into().map_err(|_| {
        RobomqError::invalid_parameter("payload", "Expected exactly 8 bytes for an integer")
    })?;
    Ok(u64::from_le_bytes(arr))
}

fn wait_duration(timeout_s: f64) -> Duration {
    // Negative timeouts mean "wait forever", matching the server-side
    // wait_for_request convention
    if !timeout_s.is_finite() || timeout_s < 0.0 {
        Duration::MAX
    } else {
        Duration::from_secs_f64(timeout_s)
    }
}

/// Apply one decoded request to a broker, producing its response
pub fn dispatch(broker: &Broker, req: &RequestEnvelope) -> ResponseEnvelope {
    match req.verb {
        Verb::AddTopic => {
            let payload = match &req.payload {
                Some(p) => p,
                None => return ResponseEnvelope::error("AddTopic requires a retention payload"),
            };
            let retention = match unpack_f64(payload) {
                Ok(v) => v,
                Err(e) => return ResponseEnvelope::error(e.to_string()),
            };
            match broker.add_topic(&req.topic, retention) {
                Ok(_) => ResponseEnvelope::Ok,
                Err(e) => ResponseEnvelope::error(e.to_string()),
            }
        }

        Verb::AddSharedMemoryTopic => {
            let payload = match &req.payload {
                Some(p) if p.len() == 16 => p,
                _ => {
                    return ResponseEnvelope::error(
                        "AddSharedMemoryTopic requires retention and size payload bytes",
                    )
                }
            };
            let retention = match unpack_f64(&payload[..8]) {
                Ok(v) => v,
                Err(e) => return ResponseEnvelope::error(e.to_string()),
            };
            let size = match unpack_u64(&payload[8..]) {
                Ok(v) => v,
                Err(e) => return ResponseEnvelope::error(e.to_string()),
            };
            match broker.add_shared_memory_topic(&req.topic, retention, size as usize) {
                Ok(_) => ResponseEnvelope::Ok,
                Err(e) => ResponseEnvelope::error(e.to_string()),
            }
        }

        Verb::Put => {
            let payload = match &req.payload {
                Some(p) => p,
                None => return ResponseEnvelope::error("Put requires a payload"),
            };
            match broker.put_data(&req.topic, payload) {
                Ok(()) => ResponseEnvelope::Ok,
                Err(e) => ResponseEnvelope::error(e.to_string()),
            }
        }

        Verb::Peek | Verb::Pop => {
            let order = match req.order {
                Some(order) => order,
                None => return ResponseEnvelope::error("Peek/Pop requires an order"),
            };
            let n = req.count.unwrap_or(-1);
            let (payloads, timestamps) = if req.verb == Verb::Peek {
                broker.peek_data(&req.topic, order, n)
            } else {
                broker.pop_data(&req.topic, order, n)
            };
            ResponseEnvelope::Data {
                payloads,
                timestamps,
            }
        }

        Verb::Status => {
            if req.topic.is_empty() {
                let mut counts: Vec<(String, i64)> =
                    broker.get_all_topic_status().into_iter().collect();
                counts.sort();
                ResponseEnvelope::Topics { counts }
            } else {
                ResponseEnvelope::Count {
                    count: broker.get_topic_status(&req.topic),
                }
            }
        }

        Verb::Request => {
            let payload = match &req.payload {
                Some(p) => p,
                None => return ResponseEnvelope::error("Request requires a payload"),
            };
            let timeout = match req.timeout_s {
                Some(t) => wait_duration(t),
                None => return ResponseEnvelope::error("Request requires timeout_s"),
            };
            match broker.request_with_data(&req.topic, payload, timeout) {
                Ok(reply) => {
                    // Timeout surfaces as an empty reply, not an error
                    if reply.is_empty() {
                        ResponseEnvelope::Data {
                            payloads: Vec::new(),
                            timestamps: Vec::new(),
                        }
                    } else {
                        ResponseEnvelope::Data {
                            payloads: vec![reply],
                            timestamps: vec![broker.get_timestamp()],
                        }
                    }
                }
                Err(e) => ResponseEnvelope::error(e.to_string()),
            }
        }

        Verb::Reply => {
            let payload = match &req.payload {
                Some(p) => p.clone(),
                None => return ResponseEnvelope::error("Reply requires a payload"),
            };
            broker.reply_request(&req.topic, vec![payload]);
            ResponseEnvelope::Ok
        }

        Verb::WaitForRequest => {
            let timeout = wait_duration(req.timeout_s.unwrap_or(-1.0));
            let (payloads, topic) = broker.wait_for_request(timeout);
            ResponseEnvelope::Request { payloads, topic }
        }
    }
}

/// Interpret a transport-level status reply
///
/// `None` (no response within the deadline) and protocol violations both
/// map to [`STATUS_UNREACHABLE`]; callers must treat that as retryable and
/// distinct from [`STATUS_NO_TOPIC`].
pub fn status_from_transport(reply: Option<&ResponseEnvelope>) -> i64 {
    match reply {
        Some(ResponseEnvelope::Count { count }) => *count,
        Some(_) | None => STATUS_UNREACHABLE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::STATUS_NO_TOPIC;

    #[test]
    fn test_envelope_round_trip() {
        let req = RequestEnvelope {
            topic: "imu".to_string(),
            verb: Verb::Peek,
            order: Some(Order::Earliest),
            count: Some(-1),
            payload: None,
            timeout_s: None,
        };
        let bytes = req.encode().unwrap();
        let back = RequestEnvelope::decode(&bytes).unwrap();
        assert_eq!(back.topic, "imu");
        assert_eq!(back.verb, Verb::Peek);
        assert_eq!(back.order, Some(Order::Earliest));
    }

    #[test]
    fn test_status_sentinels_distinguishable() {
        let count = ResponseEnvelope::Count { count: 3 };
        assert_eq!(status_from_transport(Some(&count)), 3);

        let missing = ResponseEnvelope::Count {
            count: STATUS_NO_TOPIC,
        };
        assert_eq!(status_from_transport(Some(&missing)), STATUS_NO_TOPIC);
        assert_eq!(status_from_transport(None), STATUS_UNREACHABLE);
        assert_ne!(STATUS_NO_TOPIC, STATUS_UNREACHABLE);
    }

    #[test]
    fn test_pack_unpack_retention() {
        let bytes = pack_retention(2.5);
        assert_eq!(unpack_f64(&bytes).unwrap(), 2.5);

        let bytes = pack_shared_topic(1.0, 4096);
        assert_eq!(unpack_f64(&bytes[..8]).unwrap(), 1.0);
        assert_eq!(unpack_u64(&bytes[8..]).unwrap(), 4096);
    }

    #[test]
    fn test_wait_duration_negative_is_unbounded() {
        assert_eq!(wait_duration(-1.0), Duration::MAX);
        assert_eq!(wait_duration(1.5), Duration::from_millis(1500));
    }
}

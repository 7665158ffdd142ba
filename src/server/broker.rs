//! Broker facade: the public operation surface of one server instance

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::arena::ShmArena;
use crate::clock::BrokerClock;
use crate::error::{RobomqError, Result};
use crate::rpc::{RequestBroker, TimedPayload};
use crate::store::{Order, PayloadRef, RetentionPolicy, TimedMessage};

use super::registry::{TopicEntry, TopicId, TopicRegistry};
use super::STATUS_NO_TOPIC;

/// A broker instance: topic registry, request/reply queue, broker clock
///
/// The server name feeds the deterministic shared-memory segment naming, so
/// consumers can open `segment_name(server, topic)` independently.
#[derive(Debug)]
pub struct Broker {
    name: String,
    registry: TopicRegistry,
    rpc: RequestBroker,
    clock: BrokerClock,
}

impl Broker {
    /// Create a broker named `name`
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(RobomqError::invalid_parameter(
                "name",
                "Server name cannot be empty",
            ));
        }
        Ok(Self {
            name,
            registry: TopicRegistry::new(),
            rpc: RequestBroker::new(),
            clock: BrokerClock::new(),
        })
    }

    /// Server name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Seconds since the broker clock epoch
    pub fn get_timestamp(&self) -> f64 {
        self.clock.timestamp()
    }

    /// Re-anchor the clock epoch and drop all retained messages
    ///
    /// Data stamped against the old epoch would be meaningless under the
    /// new one, so every topic is cleared.
    pub fn reset_start_time(&self, system_time_us: i64) {
        info!("Resetting start time; clearing all data stored before this time");
        self.registry.clear_all_data();
        self.clock.reset_start_time(system_time_us);
    }

    /// Register a heap-backed topic with the given retention window
    pub fn add_topic(&self, topic: &str, message_remaining_time_s: f64) -> Result<TopicId> {
        let id = self
            .registry
            .add(topic, RetentionPolicy::new(message_remaining_time_s))?;
        info!(
            "Added topic `{}` with max remaining time {}s",
            topic, message_remaining_time_s
        );
        Ok(id)
    }

    /// Register a shared-memory-backed topic with an arena of `size_bytes`
    pub fn add_shared_memory_topic(
        &self,
        topic: &str,
        message_remaining_time_s: f64,
        size_bytes: usize,
    ) -> Result<TopicId> {
        // Check the name before the arena claims an shm object for it
        if self.registry.has_topic(topic) {
            return Err(RobomqError::topic_exists(topic));
        }
        let arena = ShmArena::create(&self.name, topic, size_bytes)?;
        let id = self
            .registry
            .add_shared(topic, RetentionPolicy::new(message_remaining_time_s), arena)?;
        info!(
            "Added shared-memory topic `{}` ({} bytes, max remaining time {}s)",
            topic, size_bytes, message_remaining_time_s
        );
        Ok(id)
    }

    /// Append a payload to a topic; never blocks, no backpressure
    pub fn put_data(&self, topic: &str, data: &[u8]) -> Result<()> {
        let entry = self
            .registry
            .get(topic)
            .ok_or_else(|| RobomqError::topic_not_found(topic))?;
        let now = self.clock.timestamp();
        // The topic lock also serializes arena writes: the arena cursor has
        // exactly one writer at a time.
        let mut buffer = entry.lock();
        let payload = match entry.arena() {
            Some(arena) => PayloadRef::Shm(arena.write(data)?),
            None => PayloadRef::inline(data.to_vec()),
        };
        buffer.push(payload, now);
        Ok(())
    }

    /// Non-destructive read of up to `n` payload copies with timestamps
    ///
    /// `n < 0` means all currently retained. Unknown or empty topics return
    /// an empty result so polling clients can loop safely.
    pub fn peek_data(&self, topic: &str, order: Order, n: i32) -> (Vec<Vec<u8>>, Vec<f64>) {
        let entry = match self.registry.get(topic) {
            Some(entry) => entry,
            None => {
                debug!("peek_data on unknown topic `{}`", topic);
                return (Vec::new(), Vec::new());
            }
        };
        let now = self.clock.timestamp();
        let msgs = entry.lock().peek(order, n, now);
        self.resolve(&entry, msgs)
    }

    /// Destructive read: identical selection to `peek_data`, entries removed
    pub fn pop_data(&self, topic: &str, order: Order, n: i32) -> (Vec<Vec<u8>>, Vec<f64>) {
        let entry = match self.registry.get(topic) {
            Some(entry) => entry,
            None => {
                debug!("pop_data on unknown topic `{}`", topic);
                return (Vec::new(), Vec::new());
            }
        };
        let now = self.clock.timestamp();
        let msgs = entry.lock().pop(order, n, now);
        self.resolve(&entry, msgs)
    }

    /// Retained message count post-eviction, or [`STATUS_NO_TOPIC`]
    ///
    /// The transport layer maps "no response within the deadline" to
    /// [`super::STATUS_UNREACHABLE`]; the broker itself can always answer.
    pub fn get_topic_status(&self, topic: &str) -> i64 {
        match self.registry.get(topic) {
            Some(entry) => entry.lock().len(self.clock.timestamp()) as i64,
            None => STATUS_NO_TOPIC,
        }
    }

    /// Retained message count for every registered topic
    pub fn get_all_topic_status(&self) -> HashMap<String, i64> {
        let now = self.clock.timestamp();
        let mut counts = HashMap::new();
        for name in self.registry.names() {
            if let Some(entry) = self.registry.get(&name) {
                counts.insert(name, entry.lock().len(now) as i64);
            }
        }
        counts
    }

    /// Send a request and block until the reply or `timeout`
    ///
    /// Returns the reply bytes, or an empty buffer on timeout - timeout is
    /// a normal outcome, not an error.
    pub fn request_with_data(&self, topic: &str, data: &[u8], timeout: Duration) -> Result<Vec<u8>> {
        if !self.registry.has_topic(topic) {
            return Err(RobomqError::topic_not_found(topic));
        }
        let now = self.clock.timestamp();
        let payloads = vec![TimedPayload {
            payload: PayloadRef::inline(data.to_vec()),
            timestamp: now,
        }];
        Ok(self.first_reply(topic, self.rpc.request(topic, payloads, timeout, now)))
    }

    /// Same state machine as `request_with_data`, payload staged through
    /// the topic's shared-memory arena
    pub fn request_with_shared_memory(
        &self,
        topic: &str,
        data: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        let entry = self
            .registry
            .get(topic)
            .ok_or_else(|| RobomqError::topic_not_found(topic))?;
        let arena = entry.arena().ok_or_else(|| {
            RobomqError::invalid_parameter(
                "topic",
                format!("Topic `{}` is not shared-memory-backed", topic),
            )
        })?;

        let now = self.clock.timestamp();
        let handle = {
            // Serialize against put_data writers on the same arena
            let _buffer = entry.lock();
            arena.write(data)?
        };
        let payloads = vec![TimedPayload {
            payload: PayloadRef::Shm(handle),
            timestamp: now,
        }];
        Ok(self.first_reply(topic, self.rpc.request(topic, payloads, timeout, now)))
    }

    /// Block for the oldest unanswered request across all topics
    ///
    /// Returns `(payloads, topic)`, or `(empty, empty)` on timeout.
    pub fn wait_for_request(&self, timeout: Duration) -> (Vec<Vec<u8>>, String) {
        match self.rpc.wait_for_request(timeout) {
            None => {
                warn!("Timeout while waiting for a request");
                (Vec::new(), String::new())
            }
            Some((topic, payloads)) => {
                let entry = self.registry.get(&topic);
                let mut bytes = Vec::with_capacity(payloads.len());
                for timed in payloads {
                    match self.resolve_payload(entry.as_deref(), &timed.payload) {
                        Some(data) => bytes.push(data),
                        None => warn!(
                            "Dropping unreadable request payload on topic `{}`",
                            topic
                        ),
                    }
                }
                (bytes, topic)
            }
        }
    }

    /// Deliver reply payloads to the oldest pending request on `topic`
    ///
    /// Returns false (and drops the reply with a warning) when no request
    /// is pending.
    pub fn reply_request(&self, topic: &str, payloads: Vec<Vec<u8>>) -> bool {
        self.rpc.reply(topic, payloads)
    }

    /// Number of outstanding requests
    pub fn pending_request_count(&self) -> usize {
        self.rpc.pending_count()
    }

    /// All registered topic names
    pub fn topic_names(&self) -> Vec<String> {
        self.registry.names()
    }

    fn first_reply(&self, topic: &str, mut replies: Vec<Vec<u8>>) -> Vec<u8> {
        if replies.len() > 1 {
            warn!(
                "Expected 1 reply payload on topic `{}`, got {}; returning the first",
                topic,
                replies.len()
            );
        }
        if replies.is_empty() {
            Vec::new()
        } else {
            replies.swap_remove(0)
        }
    }

    /// Resolve a payload reference to bytes; stale shm handles resolve to
    /// `None` and are treated like evicted data
    fn resolve_payload(&self, entry: Option<&TopicEntry>, payload: &PayloadRef) -> Option<Vec<u8>> {
        match payload {
            PayloadRef::Inline(data) => Some((**data).clone()),
            PayloadRef::Shm(handle) => {
                let arena = entry.and_then(|e| e.arena())?;
                match arena.read(handle) {
                    Ok(bytes) => Some(bytes),
                    Err(RobomqError::StaleHandle { .. }) => {
                        debug!("Skipping overwritten shared-memory payload");
                        None
                    }
                    Err(e) => {
                        warn!("Failed to read shared-memory payload: {}", e);
                        None
                    }
                }
            }
        }
    }

    fn resolve(&self, entry: &Arc<TopicEntry>, msgs: Vec<TimedMessage>) -> (Vec<Vec<u8>>, Vec<f64>) {
        let mut payloads = Vec::with_capacity(msgs.len());
        let mut timestamps = Vec::with_capacity(msgs.len());
        for msg in &msgs {
            if let Some(bytes) = self.resolve_payload(Some(&**entry), &msg.payload) {
                payloads.push(bytes);
                timestamps.push(msg.timestamp);
            }
        }
        (payloads, timestamps)
    }
}

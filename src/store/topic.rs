//! Topic buffer with lazy TTL eviction

use std::collections::VecDeque;

use log::debug;
use serde::{Deserialize, Serialize};

use super::message::{Order, PayloadRef, TimedMessage};

/// Retention policy for one topic
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Maximum message age in seconds before lazy eviction
    pub message_remaining_time_s: f64,
}

impl RetentionPolicy {
    /// Create a retention policy keeping messages for `seconds`
    pub fn new(seconds: f64) -> Self {
        Self {
            message_remaining_time_s: seconds,
        }
    }
}

/// How a topic's payload bytes are backed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackingMode {
    /// Payloads owned on the heap
    Heap,
    /// Payloads stored in a shared-memory arena
    SharedMemory,
}

/// Ordered per-topic buffer of timestamped messages
///
/// Insertion order equals sequence order. Eviction drops only a contiguous
/// prefix of stale entries, so survivors are never reordered. All accessors
/// that read or mutate the buffer evict first, keeping results fresh as of
/// the supplied `now` without a timer thread.
#[derive(Debug)]
pub struct DataTopic {
    name: String,
    retention: RetentionPolicy,
    backing: BackingMode,
    entries: VecDeque<TimedMessage>,
    next_sequence: u64,
}

impl DataTopic {
    /// Create a heap-backed topic
    pub fn new(name: impl Into<String>, retention: RetentionPolicy) -> Self {
        Self::with_backing(name, retention, BackingMode::Heap)
    }

    /// Create a topic with an explicit backing mode
    pub fn with_backing(
        name: impl Into<String>,
        retention: RetentionPolicy,
        backing: BackingMode,
    ) -> Self {
        Self {
            name: name.into(),
            retention,
            backing,
            entries: VecDeque::new(),
            next_sequence: 0,
        }
    }

    /// Topic name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Retention policy
    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    /// Backing mode
    pub fn backing(&self) -> BackingMode {
        self.backing
    }

    /// Retained message count after evicting entries stale as of `now`
    pub fn len(&mut self, now: f64) -> usize {
        self.evict_stale(now);
        self.entries.len()
    }

    /// Whether the topic holds no retained messages as of `now`
    pub fn is_empty(&mut self, now: f64) -> bool {
        self.len(now) == 0
    }

    /// Append a payload stamped with `now`, returning its sequence number
    ///
    /// Never blocks and never fails: the buffer is bounded by eviction, not
    /// by backpressure.
    pub fn push(&mut self, payload: PayloadRef, now: f64) -> u64 {
        self.evict_stale(now);
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.push_back(TimedMessage {
            sequence,
            timestamp: now,
            payload,
        });
        sequence
    }

    /// Non-destructive read of up to `n` entries in the requested order
    ///
    /// `n < 0` means all currently retained entries; `n` larger than the
    /// retained count clamps to the count. An empty topic yields an empty
    /// vector, never an error.
    pub fn peek(&mut self, order: Order, n: i32, now: f64) -> Vec<TimedMessage> {
        self.evict_stale(now);
        let count = Self::window(self.entries.len(), n);
        match order {
            Order::Earliest => self.entries.iter().take(count).cloned().collect(),
            Order::Latest => self
                .entries
                .iter()
                .rev()
                .take(count)
                .cloned()
                .collect(),
        }
    }

    /// Destructive read: identical selection to `peek`, then removal
    ///
    /// Removal reflects exactly the returned window: `Earliest` drains the
    /// front, `Latest` drains the back.
    pub fn pop(&mut self, order: Order, n: i32, now: f64) -> Vec<TimedMessage> {
        self.evict_stale(now);
        let count = Self::window(self.entries.len(), n);
        match order {
            Order::Earliest => self.entries.drain(..count).collect(),
            Order::Latest => {
                let start = self.entries.len() - count;
                let mut taken: Vec<TimedMessage> = self.entries.drain(start..).collect();
                taken.reverse();
                taken
            }
        }
    }

    /// Drop all retained messages
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drop the contiguous prefix of entries older than the retention window
    pub fn evict_stale(&mut self, now: f64) -> usize {
        let mut evicted = 0;
        while let Some(front) = self.entries.front() {
            if now - front.timestamp > self.retention.message_remaining_time_s {
                self.entries.pop_front();
                evicted += 1;
            } else {
                break;
            }
        }
        if evicted > 0 {
            debug!(
                "Evicted {} stale message(s) from topic `{}`",
                evicted, self.name
            );
        }
        evicted
    }

    fn window(len: usize, n: i32) -> usize {
        if n < 0 {
            len
        } else {
            (n as usize).min(len)
        }
    }
}

//! Broker clock with a resettable monotonic epoch
//!
//! Timestamps throughout the broker are `f64` seconds measured against a
//! monotonic start time. The epoch can be re-anchored against a
//! caller-supplied system time so that independent server and client
//! processes agree on timestamps without sharing a steady clock.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Process-wide anchor for the steady clock
static STEADY_ANCHOR: OnceLock<Instant> = OnceLock::new();

/// Microseconds elapsed on the process steady clock
pub fn steady_clock_us() -> i64 {
    let anchor = STEADY_ANCHOR.get_or_init(Instant::now);
    anchor.elapsed().as_micros() as i64
}

/// Microseconds since the Unix epoch on the system clock
pub fn system_clock_us() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}

/// Monotonic clock owned by one broker instance
///
/// `timestamp` is seconds since the broker started. `reset_start_time`
/// re-anchors the epoch so that the broker's zero lines up with a shared
/// system time, which lets multiple processes compare message timestamps.
#[derive(Debug)]
pub struct BrokerClock {
    /// Steady-clock microsecond value treated as t = 0
    start_us: AtomicI64,
}

impl BrokerClock {
    /// Create a clock anchored at the current instant
    pub fn new() -> Self {
        Self {
            start_us: AtomicI64::new(steady_clock_us()),
        }
    }

    /// Seconds elapsed since the clock epoch
    pub fn timestamp(&self) -> f64 {
        (steady_clock_us() - self.start_us.load(Ordering::Relaxed)) as f64 / 1e6
    }

    /// Re-anchor the epoch against a system-clock reading in microseconds
    ///
    /// After the call, a timestamp of zero corresponds to the moment the
    /// system clock read `system_time_us`.
    pub fn reset_start_time(&self, system_time_us: i64) {
        let new_start = steady_clock_us() + (system_time_us - system_clock_us());
        self.start_us.store(new_start, Ordering::Relaxed);
    }
}

impl Default for BrokerClock {
    fn default() -> Self {
        Self::new()
    }
}

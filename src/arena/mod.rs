//! Shared-memory arena: ring-buffer allocator over a named region
//!
//! One arena backs each shared-memory topic. The server owns the region and
//! is its only writer; any number of consumer processes map the same region
//! read-only by its deterministic name. There is no cross-process lock:
//! correctness relies on a generation counter stamped into every handle and
//! bumped each time the write cursor wraps, so a reader either gets the
//! bytes it was promised or a [`crate::RobomqError::StaleHandle`] - never a
//! torn read.

pub mod ring;
pub mod segment;

pub use ring::{ShmArena, ShmArenaReader, ShmHandle, ARENA_HEADER_SIZE};
pub use segment::{segment_name, ShmSegment};

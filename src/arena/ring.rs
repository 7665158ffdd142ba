//! Ring-buffer allocator with a reader/writer generation protocol

use std::sync::atomic::{fence, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{RobomqError, Result};

use super::segment::{segment_name, ShmSegment};

/// Magic number identifying a robomq arena header
pub const ARENA_MAGIC: u64 = 0x524f_424f_4d51_4131;

/// Arena header size; the data area starts after it, cache-line aligned
pub const ARENA_HEADER_SIZE: usize = 64;

/// Handle to a payload inside an arena
///
/// Valid only while its stamped generation equals the arena's current
/// generation. A stale handle means the producer's cursor wrapped over the
/// referenced bytes; readers must not retry against the same handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShmHandle {
    /// Byte offset from the start of the data area
    pub offset: u64,
    /// Payload length in bytes
    pub len: u64,
    /// Arena generation at allocation time
    pub generation: u64,
}

/// Header at the start of every arena segment
///
/// Cursor and generation live inside the mapping so consumer processes see
/// the writer's progress without any lock. Within one generation all
/// allocations are disjoint; bytes are only ever overwritten after a wrap,
/// which bumps the generation first.
#[repr(C)]
struct ArenaHeader {
    magic: u64,
    capacity: u64,
    cursor: AtomicU64,
    generation: AtomicU64,
    _pad: [u8; ARENA_HEADER_SIZE - 32],
}

fn header_of(segment: &ShmSegment) -> Result<&ArenaHeader> {
    if segment.size() < ARENA_HEADER_SIZE {
        return Err(RobomqError::memory(format!(
            "Segment {} too small for arena header",
            segment.name()
        )));
    }
    let header = unsafe { &*(segment.as_slice().as_ptr() as *const ArenaHeader) };
    if header.magic != ARENA_MAGIC {
        return Err(RobomqError::memory(format!(
            "Segment {} is not a robomq arena",
            segment.name()
        )));
    }
    Ok(header)
}

/// Generation-checked copy out of the data area, shared by writer and readers
fn checked_read(segment: &ShmSegment, handle: &ShmHandle) -> Result<Vec<u8>> {
    let header = header_of(segment)?;

    let end = handle.offset.checked_add(handle.len).ok_or_else(|| {
        RobomqError::invalid_parameter("handle", "Handle offset + len overflows")
    })?;
    if end > header.capacity {
        return Err(RobomqError::invalid_parameter(
            "handle",
            "Handle exceeds arena capacity",
        ));
    }

    let current = header.generation.load(Ordering::Acquire);
    if current != handle.generation {
        return Err(RobomqError::stale_handle(handle.generation, current));
    }

    let start = ARENA_HEADER_SIZE + handle.offset as usize;
    let bytes = segment.as_slice()[start..start + handle.len as usize].to_vec();

    // Re-check after the copy: if the writer wrapped mid-read the copy may
    // be torn and must be rejected.
    fence(Ordering::Acquire);
    let current = header.generation.load(Ordering::Acquire);
    if current != handle.generation {
        return Err(RobomqError::stale_handle(handle.generation, current));
    }

    Ok(bytes)
}

/// Writer side of a shared-memory arena (exactly one per topic)
///
/// Owned by the server process. Allocation never blocks: when the tail
/// cannot fit a payload the cursor wraps to offset 0 and the generation is
/// bumped, deliberately sacrificing any unread data the new region covers.
#[derive(Debug)]
pub struct ShmArena {
    segment: ShmSegment,
}

impl ShmArena {
    /// Create the arena for `topic` owned by `server`, `size_bytes` total
    pub fn create(server: &str, topic: &str, size_bytes: usize) -> Result<Self> {
        Self::create_named(&segment_name(server, topic), size_bytes)
    }

    /// Create an arena with an explicit segment name
    pub fn create_named(name: &str, size_bytes: usize) -> Result<Self> {
        if size_bytes <= ARENA_HEADER_SIZE {
            return Err(RobomqError::invalid_parameter(
                "size_bytes",
                format!("Arena size must exceed the {}-byte header", ARENA_HEADER_SIZE),
            ));
        }
        let segment = ShmSegment::create(name, size_bytes)?;

        // Fresh shm segments are zero-filled; only the plain fields need
        // initializing before the arena is shared.
        unsafe {
            let header = segment.as_mut_ptr_unsafe() as *mut ArenaHeader;
            (*header).magic = ARENA_MAGIC;
            (*header).capacity = (size_bytes - ARENA_HEADER_SIZE) as u64;
        }
        fence(Ordering::Release);

        Ok(Self { segment })
    }

    fn header(&self) -> &ArenaHeader {
        // The writer initialized the header in create_named
        unsafe { &*(self.segment.as_slice().as_ptr() as *const ArenaHeader) }
    }

    /// Segment name consumers use to open this arena
    pub fn name(&self) -> &str {
        self.segment.name()
    }

    /// Usable data capacity in bytes
    pub fn capacity(&self) -> usize {
        self.header().capacity as usize
    }

    /// Current generation (bumped on every cursor wrap)
    pub fn generation(&self) -> u64 {
        self.header().generation.load(Ordering::Acquire)
    }

    /// Current write cursor offset
    pub fn cursor(&self) -> u64 {
        self.header().cursor.load(Ordering::Acquire)
    }

    /// Reserve `len` contiguous bytes, wrapping and bumping the generation
    /// when the tail space is insufficient
    pub fn allocate(&self, len: usize) -> Result<ShmHandle> {
        let header = self.header();
        let capacity = header.capacity;
        let len64 = len as u64;
        if len64 > capacity {
            return Err(RobomqError::allocation_too_large(len, capacity as usize));
        }

        let cursor = header.cursor.load(Ordering::Relaxed);
        let (offset, generation) = if cursor + len64 > capacity {
            // Wrap: bump the generation before the region is reused so
            // readers of older handles fail the stamp check instead of
            // seeing overwritten bytes.
            let generation = header.generation.fetch_add(1, Ordering::AcqRel) + 1;
            header.cursor.store(len64, Ordering::Release);
            (0, generation)
        } else {
            header.cursor.store(cursor + len64, Ordering::Release);
            (cursor, header.generation.load(Ordering::Relaxed))
        };

        Ok(ShmHandle {
            offset,
            len: len64,
            generation,
        })
    }

    /// Allocate and copy `bytes` into the arena, returning its handle
    pub fn write(&self, bytes: &[u8]) -> Result<ShmHandle> {
        let handle = self.allocate(bytes.len())?;
        unsafe {
            let dst = self
                .segment
                .as_mut_ptr_unsafe()
                .add(ARENA_HEADER_SIZE + handle.offset as usize);
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
        }
        // Data must be visible before the handle travels to any reader
        fence(Ordering::Release);
        Ok(handle)
    }

    /// Generation-checked read (the writer may read its own arena)
    pub fn read(&self, handle: &ShmHandle) -> Result<Vec<u8>> {
        checked_read(&self.segment, handle)
    }
}

/// Read-only consumer mapping of another process's arena
#[derive(Debug)]
pub struct ShmArenaReader {
    segment: ShmSegment,
}

impl ShmArenaReader {
    /// Open the arena for `topic` owned by `server`
    pub fn open(server: &str, topic: &str) -> Result<Self> {
        Self::open_named(&segment_name(server, topic))
    }

    /// Open an arena by explicit segment name
    pub fn open_named(name: &str) -> Result<Self> {
        let segment = ShmSegment::open(name)?;
        header_of(&segment)?;
        Ok(Self { segment })
    }

    /// Current generation of the producer's arena
    pub fn generation(&self) -> Result<u64> {
        Ok(header_of(&self.segment)?.generation.load(Ordering::Acquire))
    }

    /// Generation-checked read of a handle's bytes
    pub fn read(&self, handle: &ShmHandle) -> Result<Vec<u8>> {
        checked_read(&self.segment, handle)
    }
}

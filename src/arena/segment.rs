//! Named shared-memory segments (POSIX shm_open backed)

use std::fs::File;

use memmap2::{Mmap, MmapMut, MmapOptions};
use nix::fcntl::OFlag;
use nix::sys::mman::{shm_open, shm_unlink};
use nix::sys::stat::Mode;
use nix::unistd::ftruncate;

use crate::error::{RobomqError, Result};

/// Deterministic segment name for a topic owned by a server
///
/// Consumers rebuild this name from `(server, topic)` to open the producer's
/// region independently. Slashes are flattened so topic names like
/// `camera/rgb` stay valid shm object names.
pub fn segment_name(server: &str, topic: &str) -> String {
    format!(
        "robomq_{}_{}",
        server.replace('/', "_"),
        topic.replace('/', "_")
    )
}

fn shm_object_path(name: &str) -> String {
    format!("/{}", name)
}

#[derive(Debug)]
enum Mapping {
    Writable(MmapMut),
    ReadOnly(Mmap),
}

/// A named shared-memory segment
///
/// Created read-write by the owning server, opened read-only by consumers.
/// The creator unlinks the shm object on drop; reader mappings stay valid
/// until they are themselves dropped.
#[derive(Debug)]
pub struct ShmSegment {
    name: String,
    size: usize,
    mapping: Mapping,
    _file: File,
    owner: bool,
}

impl ShmSegment {
    /// Create a new segment of `size` bytes, failing if the name is taken
    pub fn create(name: &str, size: usize) -> Result<Self> {
        if name.is_empty() {
            return Err(RobomqError::invalid_parameter(
                "name",
                "Segment name cannot be empty",
            ));
        }
        if size == 0 {
            return Err(RobomqError::invalid_parameter(
                "size",
                "Segment size must be greater than 0",
            ));
        }

        let path = shm_object_path(name);
        let fd = shm_open(
            path.as_str(),
            OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_RDWR,
            Mode::S_IRUSR | Mode::S_IWUSR,
        )
        .map_err(|e| RobomqError::memory(format!("shm_open({}) failed: {}", path, e)))?;

        ftruncate(&fd, size as i64)
            .map_err(|e| RobomqError::memory(format!("ftruncate({}) failed: {}", path, e)))?;

        let file = File::from(fd);
        let mmap = unsafe {
            MmapOptions::new()
                .len(size)
                .map_mut(&file)
                .map_err(|e| RobomqError::from_io(e, "Failed to map segment"))?
        };

        Ok(Self {
            name: name.to_string(),
            size,
            mapping: Mapping::Writable(mmap),
            _file: file,
            owner: true,
        })
    }

    /// Open an existing segment read-only by name
    pub fn open(name: &str) -> Result<Self> {
        let path = shm_object_path(name);
        let fd = shm_open(path.as_str(), OFlag::O_RDONLY, Mode::empty())
            .map_err(|e| RobomqError::memory(format!("shm_open({}) failed: {}", path, e)))?;

        let file = File::from(fd);
        let size = file
            .metadata()
            .map_err(|e| RobomqError::from_io(e, "Failed to stat segment"))?
            .len() as usize;

        let mmap = unsafe {
            MmapOptions::new()
                .len(size)
                .map(&file)
                .map_err(|e| RobomqError::from_io(e, "Failed to map segment read-only"))?
        };

        Ok(Self {
            name: name.to_string(),
            size,
            mapping: Mapping::ReadOnly(mmap),
            _file: file,
            owner: false,
        })
    }

    /// Segment name (without the leading shm slash)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Segment size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether this handle created (and will unlink) the segment
    pub fn is_owner(&self) -> bool {
        self.owner
    }

    /// Raw read access to the mapped bytes
    pub fn as_slice(&self) -> &[u8] {
        match &self.mapping {
            Mapping::Writable(m) => m,
            Mapping::ReadOnly(m) => m,
        }
    }

    /// Raw mutable pointer into the mapping
    ///
    /// # Safety
    /// Caller must be the single writer and must not write outside the
    /// segment bounds.
    pub unsafe fn as_mut_ptr_unsafe(&self) -> *mut u8 {
        self.as_slice().as_ptr() as *mut u8
    }

    /// Whether writes are permitted on this mapping
    pub fn is_writable(&self) -> bool {
        matches!(self.mapping, Mapping::Writable(_))
    }
}

impl Drop for ShmSegment {
    fn drop(&mut self) {
        if self.owner {
            let path = shm_object_path(&self.name);
            if let Err(e) = shm_unlink(path.as_str()) {
                log::warn!("Failed to unlink shm segment {}: {}", path, e);
            }
        }
    }
}

unsafe impl Send for ShmSegment {}
unsafe impl Sync for ShmSegment {}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_name(tag: &str) -> String {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        format!(
            "robomq_test_{}_{}_{}",
            tag,
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        )
    }

    #[test]
    fn test_create_and_reopen() {
        let name = unique_name("seg");
        let seg = ShmSegment::create(&name, 4096).unwrap();
        assert_eq!(seg.size(), 4096);
        assert!(seg.is_owner());
        assert!(seg.is_writable());

        let reader = ShmSegment::open(&name).unwrap();
        assert_eq!(reader.size(), 4096);
        assert!(!reader.is_owner());
        assert!(!reader.is_writable());
    }

    #[test]
    fn test_create_conflict() {
        let name = unique_name("dup");
        let _seg = ShmSegment::create(&name, 1024).unwrap();
        assert!(ShmSegment::create(&name, 1024).is_err());
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(ShmSegment::create("", 1024).is_err());
        assert!(ShmSegment::create(&unique_name("zero"), 0).is_err());
    }

    #[test]
    fn test_segment_name_is_deterministic() {
        assert_eq!(
            segment_name("srv", "camera/rgb"),
            segment_name("srv", "camera/rgb")
        );
        assert_eq!(segment_name("srv", "camera/rgb"), "robomq_srv_camera_rgb");
    }
}

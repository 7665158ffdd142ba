//! Error types and handling for robomq

/// Result type alias for robomq operations
pub type Result<T> = std::result::Result<T, RobomqError>;

/// Error types for the robomq broker
///
/// Absence of data (empty topic, no pending request, expired wait) is never
/// an error: those outcomes are communicated through empty results or
/// sentinel counts. Errors cover structural misuse and platform failures.
#[derive(Debug, thiserror::Error)]
pub enum RobomqError {
    /// I/O related errors (shm_open, mmap, etc.)
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Topic name is not registered on the broker
    #[error("Topic not found: {name}")]
    TopicNotFound { name: String },

    /// Topic name is already registered on the broker
    #[error("Topic already exists: {name}")]
    TopicExists { name: String },

    /// No response from the broker within the transport deadline
    #[error("Server unreachable: {endpoint}")]
    ServerUnreachable { endpoint: String },

    /// No reply arrived within the request deadline
    #[error("Request timed out after {timeout_s}s on topic {topic}")]
    RequestTimeout { topic: String, timeout_s: f64 },

    /// Shared-memory handle generation no longer matches the arena
    #[error("Stale handle: stamped generation {stamped}, arena generation {current}")]
    StaleHandle { stamped: u64, current: u64 },

    /// Requested payload exceeds arena capacity even after a wrap
    #[error("Allocation too large: requested {requested}, arena capacity {capacity}")]
    AllocationTooLarge { requested: usize, capacity: usize },

    /// Memory mapping or layout failures
    #[error("Memory error: {message}")]
    Memory { message: String },

    /// Invalid parameters or configuration
    #[error("Invalid parameter: {parameter} - {message}")]
    InvalidParameter { parameter: String, message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl RobomqError {
    /// Create an I/O error from a standard I/O error
    pub fn from_io(source: std::io::Error, context: &str) -> Self {
        Self::Io {
            message: format!("{}: {}", context, source),
            source: Some(source),
        }
    }

    /// Create a topic not found error
    pub fn topic_not_found(name: impl Into<String>) -> Self {
        Self::TopicNotFound { name: name.into() }
    }

    /// Create a topic exists error
    pub fn topic_exists(name: impl Into<String>) -> Self {
        Self::TopicExists { name: name.into() }
    }

    /// Create a stale handle error
    pub fn stale_handle(stamped: u64, current: u64) -> Self {
        Self::StaleHandle { stamped, current }
    }

    /// Create an allocation too large error
    pub fn allocation_too_large(requested: usize, capacity: usize) -> Self {
        Self::AllocationTooLarge {
            requested,
            capacity,
        }
    }

    /// Create a memory error
    pub fn memory(message: impl Into<String>) -> Self {
        Self::Memory {
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

// Convert from common error types
impl From<std::io::Error> for RobomqError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io(err, "I/O operation failed")
    }
}

impl From<bincode::Error> for RobomqError {
    fn from(err: bincode::Error) -> Self {
        Self::serialization(format!("Bincode error: {}", err))
    }
}

impl From<nix::errno::Errno> for RobomqError {
    fn from(err: nix::errno::Errno) -> Self {
        Self::memory(format!("System call failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = RobomqError::topic_not_found("camera_rgb");
        assert!(matches!(err, RobomqError::TopicNotFound { .. }));

        let err = RobomqError::stale_handle(3, 5);
        assert!(matches!(err, RobomqError::StaleHandle { .. }));

        let err = RobomqError::allocation_too_large(2048, 1024);
        assert!(matches!(err, RobomqError::AllocationTooLarge { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = RobomqError::topic_exists("imu");
        let display = format!("{}", err);
        assert!(display.contains("already exists"));
        assert!(display.contains("imu"));

        let err = RobomqError::stale_handle(1, 2);
        let display = format!("{}", err);
        assert!(display.contains("generation 1"));
    }
}

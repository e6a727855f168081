//! Error types for the PCM pipeline

use thiserror::Error;

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;

/// Errors that can occur while talking to the platform audio gateway
/// or while moving PCM frames through the pipeline
#[derive(Debug, Error)]
pub enum AudioError {
    /// Format or device not supported by the platform
    #[error("Unsupported: {reason}")]
    Unsupported { reason: String },

    /// Operation attempted on an uninitialized or released handle
    #[error("Not initialized: {operation}")]
    NotInitialized { operation: String },

    /// Device read returned a negative status
    #[error("Device read failed with code {code}")]
    DeviceRead { code: i32 },

    /// Device write failed
    #[error("Device write failed: {reason}")]
    DeviceWrite { reason: String },

    /// Operation timed out
    #[error("{operation} timed out after {millis} ms")]
    Timeout { operation: String, millis: u64 },

    /// The other side of a hand-off went away
    #[error("Channel closed")]
    Closed,

    /// I/O error from a PCM byte source
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AudioError {
    /// Create an unsupported error
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::Unsupported {
            reason: reason.into(),
        }
    }

    /// Create a not-initialized error
    pub fn not_initialized(operation: impl Into<String>) -> Self {
        Self::NotInitialized {
            operation: operation.into(),
        }
    }

    /// Create a device write error
    pub fn device_write(reason: impl Into<String>) -> Self {
        Self::DeviceWrite {
            reason: reason.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, millis: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            millis,
        }
    }

    /// Whether this error only signals that a bounded wait expired
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

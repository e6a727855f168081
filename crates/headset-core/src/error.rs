//! Error types for the headset demux and SCO controller

use thiserror::Error;

/// Result type for headset operations
pub type HeadsetResult<T> = Result<T, HeadsetError>;

/// Errors raised at the Bluetooth platform seam and while decoding
/// headset broadcasts
#[derive(Debug, Error)]
pub enum HeadsetError {
    /// No Bluetooth adapter, or SCO is not available off call
    #[error("Unsupported: {reason}")]
    Unsupported { reason: String },

    /// The same context tried to register a second time
    #[error("Receiver already registered for context {context}")]
    AlreadyRegistered { context: String },

    /// Malformed broadcast payload
    #[error("Malformed {action} broadcast: {reason}")]
    BroadcastParse { action: String, reason: String },

    /// SCO reported connected without passing through connecting
    #[error("Stale SCO session (previous state {previous})")]
    StaleSession { previous: String },

    /// Bounded operation expired
    #[error("{operation} timed out after {millis} ms")]
    Timeout { operation: String, millis: u64 },

    /// The platform refused a request
    #[error("Platform error: {0}")]
    Platform(String),
}

impl HeadsetError {
    /// Create an unsupported error
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::Unsupported {
            reason: reason.into(),
        }
    }

    /// Create a broadcast parse error
    pub fn broadcast_parse(action: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BroadcastParse {
            action: action.into(),
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

    /// Create a platform error
    pub fn platform(reason: impl Into<String>) -> Self {
        Self::Platform(reason.into())
    }
}

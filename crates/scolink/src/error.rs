//! Top-level error type

use scolink_audio_core::AudioError;
use scolink_headset_core::HeadsetError;
use thiserror::Error;

/// Result type for facade operations
pub type ScolinkResult<T> = Result<T, ScolinkError>;

/// Errors surfaced by the facade
#[derive(Debug, Error)]
pub enum ScolinkError {
    /// PCM pipeline error
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    /// Headset or SCO error
    #[error("Headset error: {0}")]
    Headset(#[from] HeadsetError),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error while loading configuration
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScolinkError {
    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config(reason.into())
    }
}

impl From<toml::de::Error> for ScolinkError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

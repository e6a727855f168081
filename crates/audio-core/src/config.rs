//! Playback pipeline configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default producer wait for a consumer, in milliseconds
pub const DEFAULT_OFFER_TIMEOUT_MS: u64 = 100;

/// Default consumer wait for a frame, in milliseconds
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 300;

/// Timing of the live playback hand-off
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// How long `write` waits for the playback task to take a frame
    /// before dropping it
    pub offer_timeout_ms: u64,
    /// How long the playback task waits for the next frame before treating
    /// the stream as ended
    pub poll_timeout_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            offer_timeout_ms: DEFAULT_OFFER_TIMEOUT_MS,
            poll_timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
        }
    }
}

impl PlaybackConfig {
    /// Producer wait as a [`Duration`]
    pub fn offer_timeout(&self) -> Duration {
        Duration::from_millis(self.offer_timeout_ms)
    }

    /// Consumer wait as a [`Duration`]
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Set the producer wait
    pub fn with_offer_timeout(mut self, timeout: Duration) -> Self {
        self.offer_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the consumer wait
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout_ms = timeout.as_millis() as u64;
        self
    }
}

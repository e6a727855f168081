//! SCO controller configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default total duration of the bring-up retry, in milliseconds
pub const DEFAULT_RETRY_HORIZON_MS: u64 = 10_000;

/// Default interval between bring-up attempts, in milliseconds
pub const DEFAULT_RETRY_PERIOD_MS: u64 = 1_000;

/// Default window in which an identical broadcast counts as a duplicate
pub const DEFAULT_DEDUPE_WINDOW_MS: u64 = 50;

/// Timing of the SCO bring-up and the broadcast dispatcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoConfig {
    /// How long the retry timer keeps asking the platform to start SCO
    pub retry_horizon_ms: u64,
    /// Period of the retry timer
    pub retry_period_ms: u64,
    /// Identical broadcasts closer together than this are delivered once.
    /// Zero disables deduplication.
    pub dedupe_window_ms: u64,
}

impl Default for ScoConfig {
    fn default() -> Self {
        Self {
            retry_horizon_ms: DEFAULT_RETRY_HORIZON_MS,
            retry_period_ms: DEFAULT_RETRY_PERIOD_MS,
            dedupe_window_ms: DEFAULT_DEDUPE_WINDOW_MS,
        }
    }
}

impl ScoConfig {
    /// Retry horizon as a [`Duration`]
    pub fn retry_horizon(&self) -> Duration {
        Duration::from_millis(self.retry_horizon_ms)
    }

    /// Retry period as a [`Duration`]
    pub fn retry_period(&self) -> Duration {
        Duration::from_millis(self.retry_period_ms)
    }

    /// Dedupe window as a [`Duration`]
    pub fn dedupe_window(&self) -> Duration {
        Duration::from_millis(self.dedupe_window_ms)
    }

    /// Number of ticks in one horizon: one per started period
    pub fn ticks_per_horizon(&self) -> u64 {
        if self.retry_period_ms == 0 {
            return 0;
        }
        self.retry_horizon_ms.div_ceil(self.retry_period_ms)
    }

    /// Set the retry horizon
    pub fn with_retry_horizon(mut self, horizon: Duration) -> Self {
        self.retry_horizon_ms = horizon.as_millis() as u64;
        self
    }

    /// Set the retry period
    pub fn with_retry_period(mut self, period: Duration) -> Self {
        self.retry_period_ms = period.as_millis() as u64;
        self
    }

    /// Set the dedupe window
    pub fn with_dedupe_window(mut self, window: Duration) -> Self {
        self.dedupe_window_ms = window.as_millis() as u64;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ticks() {
        assert_eq!(ScoConfig::default().ticks_per_horizon(), 10);
    }

    #[test]
    fn test_partial_period_still_ticks() {
        let config = ScoConfig::default().with_retry_horizon(Duration::from_millis(2500));
        assert_eq!(config.ticks_per_horizon(), 3);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: ScoConfig = serde_json::from_str(r#"{"retry_period_ms": 500}"#).unwrap();
        assert_eq!(config.retry_period_ms, 500);
        assert_eq!(config.retry_horizon_ms, DEFAULT_RETRY_HORIZON_MS);
        assert_eq!(config.dedupe_window_ms, DEFAULT_DEDUPE_WINDOW_MS);
    }
}

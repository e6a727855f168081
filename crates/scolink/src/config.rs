//! Application configuration
//!
//! Every section is optional in TOML and falls back to its defaults:
//!
//! ```toml
//! [sco]
//! retry_horizon_ms = 10000
//! retry_period_ms = 1000
//!
//! [playback]
//! offer_timeout_ms = 100
//! poll_timeout_ms = 300
//!
//! [format]
//! sample_rate_hz = 44100
//! channels = "mono"
//! sample_bits = 16
//!
//! [logging]
//! level = "debug"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use scolink_audio_core::{AudioFormatSpec, PlaybackConfig};
use scolink_headset_core::ScoConfig;

use crate::error::{ScolinkError, ScolinkResult};
use crate::logging::{LoggingConfig, parse_log_level};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScolinkConfig {
    /// SCO bring-up timing
    pub sco: ScoConfig,
    /// Live playback hand-off timing
    pub playback: PlaybackConfig,
    /// Logging
    pub logging: LoggingConfig,
    /// Capture and playback format
    pub format: AudioFormatSpec,
}

impl ScolinkConfig {
    /// Parse and validate a TOML document.
    ///
    /// A sample rate outside the whitelist is replaced by the fallback rate.
    pub fn from_toml_str(input: &str) -> ScolinkResult<Self> {
        let mut config: ScolinkConfig = toml::from_str(input)?;
        if !config.format.is_supported_rate() {
            let normalized = config.format.normalized();
            warn!(
                requested = config.format.sample_rate_hz,
                using = normalized.sample_rate_hz,
                "unsupported sample rate in configuration"
            );
            config.format = normalized;
        }
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> ScolinkResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Serialize back to TOML
    pub fn to_toml_string(&self) -> ScolinkResult<String> {
        toml::to_string(self).map_err(|e| ScolinkError::config(e.to_string()))
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> ScolinkResult<()> {
        if self.sco.retry_period_ms == 0 {
            return Err(ScolinkError::config("sco.retry_period_ms must be non-zero"));
        }
        if self.sco.retry_period_ms > self.sco.retry_horizon_ms {
            return Err(ScolinkError::config(format!(
                "sco.retry_period_ms ({}) exceeds sco.retry_horizon_ms ({})",
                self.sco.retry_period_ms, self.sco.retry_horizon_ms
            )));
        }
        if self.playback.offer_timeout_ms == 0 || self.playback.poll_timeout_ms == 0 {
            return Err(ScolinkError::config("playback timeouts must be non-zero"));
        }
        if !self.format.is_supported_rate() {
            return Err(ScolinkError::config(format!(
                "unsupported sample rate: {}",
                self.format.sample_rate_hz
            )));
        }
        parse_log_level(&self.logging.level)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ScolinkConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sco.ticks_per_horizon(), 10);
        assert_eq!(config.format, AudioFormatSpec::cd_mono());
    }

    #[test]
    fn test_toml_round_trip_keeps_values() {
        let mut config = ScolinkConfig::default();
        config.sco.retry_horizon_ms = 4000;
        config.logging.level = "debug".to_string();
        let text = config.to_toml_string().unwrap();
        assert_eq!(ScolinkConfig::from_toml_str(&text).unwrap(), config);
    }
}

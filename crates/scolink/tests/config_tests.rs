//! Loading configuration from TOML

use scolink::{ChannelLayout, SampleBits, ScolinkConfig, ScolinkError};
use std::io::Write;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

#[test]
fn test_empty_document_uses_defaults() {
    let config = assert_ok!(ScolinkConfig::from_toml_str(""));
    assert_eq!(config, ScolinkConfig::default());
    assert_eq!(config.sco.retry_horizon(), Duration::from_secs(10));
    assert_eq!(config.sco.retry_period(), Duration::from_secs(1));
    assert_eq!(config.sco.dedupe_window(), Duration::from_millis(50));
    assert_eq!(config.playback.offer_timeout(), Duration::from_millis(100));
    assert_eq!(config.playback.poll_timeout(), Duration::from_millis(300));
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_partial_sections_keep_other_defaults() {
    let config = assert_ok!(ScolinkConfig::from_toml_str(
        r#"
        [sco]
        retry_horizon_ms = 3000

        [format]
        sample_rate_hz = 8000
        channels = "stereo"
        sample_bits = 8

        [logging]
        level = "debug"
        json = true
        "#
    ));

    assert_eq!(config.sco.retry_horizon_ms, 3000);
    assert_eq!(config.sco.retry_period_ms, 1000);
    assert_eq!(config.sco.ticks_per_horizon(), 3);
    assert_eq!(config.format.sample_rate_hz, 8000);
    assert_eq!(config.format.channels, ChannelLayout::Stereo);
    assert_eq!(config.format.sample_bits, SampleBits::Eight);
    assert!(config.logging.json);
    assert_eq!(config.playback.poll_timeout_ms, 300);
}

#[test]
fn test_unsupported_rate_falls_back() {
    let config = assert_ok!(ScolinkConfig::from_toml_str(
        r#"
        [format]
        sample_rate_hz = 44101
        channels = "mono"
        sample_bits = 16
        "#
    ));
    assert_eq!(config.format.sample_rate_hz, 16000);
}

#[test]
fn test_invalid_values_are_rejected() {
    let cases = [
        "[sco]\nretry_period_ms = 0",
        "[sco]\nretry_horizon_ms = 500\nretry_period_ms = 1000",
        "[playback]\noffer_timeout_ms = 0",
        "[logging]\nlevel = \"shouty\"",
        "[format]\nsample_rate_hz = 8000\nchannels = \"mono\"\nsample_bits = 24",
        "[sco]\nretry_horizon_ms = \"long\"",
    ];
    for case in cases {
        let err = assert_err!(ScolinkConfig::from_toml_str(case), "accepted: {}", case);
        assert!(matches!(err, ScolinkError::Config(_)), "{}: {}", case, err);
    }
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[playback]\noffer_timeout_ms = 40").unwrap();

    let config = assert_ok!(ScolinkConfig::from_file(file.path()));
    assert_eq!(config.playback.offer_timeout_ms, 40);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = assert_err!(ScolinkConfig::from_file(dir.path().join("absent.toml")));
    assert!(matches!(err, ScolinkError::Io(_)));
}

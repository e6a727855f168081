//! # scolink-audio-core
//!
//! PCM capture and playback over a pluggable platform audio gateway.
//!
//! ## Architecture
//!
//! ```text
//!  AudioGateway ──open_input──▶ AudioCapture ──PcmCallback──┐
//!       │                        (reader task)              │
//!       │                                                   ▼
//!       └──────open_output──▶ AudioPlayer ◀── Rendezvous (capacity 1)
//!                              (playback task)
//! ```
//!
//! - [`gateway`]: traits isolating the platform audio driver
//! - [`capture`]: microphone reader task and callback slot
//! - [`rendezvous`]: bounded single-slot hand-off with drop-on-timeout
//! - [`player`]: live and file playback tasks
//! - [`device::test_audio`]: in-memory gateway for tests and demos
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use scolink_audio_core::{AudioCapture, AudioFormatSpec, AudioPlayer, TestAudioGateway};
//!
//! # async fn example() {
//! let gateway = Arc::new(TestAudioGateway::default());
//! let spec = AudioFormatSpec::cd_mono();
//!
//! let player = AudioPlayer::new(gateway.clone());
//! player.prepare(spec).await;
//!
//! let capture = AudioCapture::new(gateway.as_ref(), spec).await;
//! capture.set_callback(Arc::new(player.clone())).await;
//! capture.start().await;
//! player.play();
//! # }
//! ```

pub mod capture;
pub mod config;
pub mod device;
pub mod error;
pub mod gateway;
pub mod player;
pub mod rendezvous;
pub mod types;

pub use capture::{AudioCapture, FnPcmCallback, PcmCallback, pcm_callback};
pub use config::PlaybackConfig;
pub use device::test_audio::{TestAudioBuffers, TestAudioGateway};
pub use error::{AudioError, AudioResult};
pub use gateway::{AudioGateway, AudioInput, AudioOutput};
pub use player::{AudioPlayer, PlaybackListener};
pub use rendezvous::Rendezvous;
pub use types::{
    AudioFormatSpec, CaptureState, ChannelLayout, FALLBACK_SAMPLE_RATE, PcmFrame, PlayState,
    SUPPORTED_SAMPLE_RATES, SampleBits, StreamDirection, normalize_sample_rate,
};

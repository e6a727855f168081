//! # scolink
//!
//! Record through a Bluetooth headset over an SCO voice link and play the
//! PCM back.
//!
//! This crate ties the two building blocks together:
//!
//! - [`scolink_headset_core`]: headset events and the SCO bring-up
//!   controller
//! - [`scolink_audio_core`]: microphone capture, the playback hand-off,
//!   and PCM playback
//!
//! and adds TOML configuration, logging setup, and a loopback session that
//! starts when SCO audio is up.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use scolink::{
//!     FakeBluetoothPlatform, ScoController, ScoLoopbackTrigger, ScolinkConfig, TestAudioGateway,
//! };
//!
//! # async fn example() -> scolink::ScolinkResult<()> {
//! let config = ScolinkConfig::from_toml_str("[sco]\nretry_horizon_ms = 5000")?;
//! let platform = Arc::new(FakeBluetoothPlatform::new().with_headset_input().with_auto_connect());
//! let gateway = Arc::new(TestAudioGateway::default());
//!
//! let controller = ScoController::with_config(platform, config.sco.clone());
//! controller.add_listener(Arc::new(ScoLoopbackTrigger::from_config(gateway, &config)));
//! controller.start().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod loopback;

pub use config::ScolinkConfig;
pub use error::{ScolinkError, ScolinkResult};
pub use logging::{LoggingConfig, log_welcome, parse_log_level, setup_logging};
pub use loopback::{LoopbackSession, ScoLoopbackTrigger};

pub use scolink_audio_core::{
    AudioCapture, AudioError, AudioFormatSpec, AudioGateway, AudioInput, AudioOutput, AudioPlayer,
    CaptureState, ChannelLayout, PcmCallback, PlayState, PlaybackConfig, PlaybackListener,
    SampleBits, TestAudioBuffers, TestAudioGateway, pcm_callback,
};
pub use scolink_headset_core::{
    AudioMode, BluetoothPlatform, Broadcast, ControllerState, FakeBluetoothPlatform,
    HeadsetError, HeadsetEvent, HeadsetEventDemux, InputDeviceType, RemoteDevice, ScoConfig,
    ScoController, ScoEvent, ScoLinkState, ScoListener,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The types most applications need
pub mod prelude {
    pub use crate::{
        AudioFormatSpec, AudioGateway, BluetoothPlatform, LoopbackSession, ScoController,
        ScoEvent, ScoListener, ScoLoopbackTrigger, ScolinkConfig, ScolinkError, ScolinkResult,
    };
}

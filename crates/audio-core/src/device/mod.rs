//! Audio device backends
//!
//! Platform backends implement [`AudioGateway`](crate::gateway::AudioGateway).
//! The in-memory backend here drives the pipeline in tests and demos.

pub mod test_audio;

pub use test_audio::{ScriptedRead, TestAudioBuffers, TestAudioGateway, TestAudioInput, TestAudioOutput};

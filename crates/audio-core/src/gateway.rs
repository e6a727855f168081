//! Platform audio gateway
//!
//! These traits isolate the platform audio driver: opening a microphone
//! source and an output sink, querying the device minimum buffer size, and
//! blocking read/write. The capture and playback paths only talk to the
//! platform through them, so both can run against the in-memory
//! [`TestAudioGateway`](crate::device::test_audio::TestAudioGateway).

use std::fmt::Debug;
use std::sync::Arc;

use crate::error::AudioResult;
use crate::types::{AudioFormatSpec, StreamDirection};

/// Entry point to the platform audio driver
#[async_trait::async_trait]
pub trait AudioGateway: Send + Sync + Debug {
    /// Minimum device buffer size in bytes for the given format and direction
    fn min_buffer_size(&self, spec: &AudioFormatSpec, direction: StreamDirection) -> AudioResult<usize>;

    /// Allocate a recording source.
    ///
    /// Fails with [`AudioError::Unsupported`](crate::AudioError::Unsupported)
    /// when the platform refuses the format.
    async fn open_input(&self, spec: &AudioFormatSpec) -> AudioResult<Arc<dyn AudioInput>>;

    /// Allocate a streaming output sink
    async fn open_output(&self, spec: &AudioFormatSpec) -> AudioResult<Arc<dyn AudioOutput>>;
}

/// An allocated microphone source.
///
/// `start`, `stop` and `release` tolerate repeated calls. After `release`
/// the handle is unusable and `read` fails.
#[async_trait::async_trait]
pub trait AudioInput: Send + Sync + Debug {
    /// Platform-reported minimum buffer size used for each read
    fn min_buffer_size(&self) -> usize;

    /// Format the source was opened with
    fn format(&self) -> AudioFormatSpec;

    /// Begin recording
    async fn start(&self) -> AudioResult<()>;

    /// Stop recording; pending reads return
    async fn stop(&self) -> AudioResult<()>;

    /// Release the platform resource
    async fn release(&self) -> AudioResult<()>;

    /// Fill `buf` with captured bytes.
    ///
    /// Blocks up to the device latency. Returns the number of bytes filled,
    /// which may be less than `buf.len()`. A negative platform status is
    /// reported as [`AudioError::DeviceRead`](crate::AudioError::DeviceRead).
    async fn read(&self, buf: &mut [u8]) -> AudioResult<usize>;
}

/// An allocated output sink
#[async_trait::async_trait]
pub trait AudioOutput: Send + Sync + Debug {
    /// Platform-reported minimum buffer size
    fn min_buffer_size(&self) -> usize;

    /// Format the sink was opened with
    fn format(&self) -> AudioFormatSpec;

    /// Begin playback
    async fn start(&self) -> AudioResult<()>;

    /// Stop playback; pending writes return
    async fn stop(&self) -> AudioResult<()>;

    /// Release the platform resource
    async fn release(&self) -> AudioResult<()>;

    /// Write `data` to the sink, blocking until it is accepted or the sink
    /// is stopped. Returns the number of bytes accepted.
    async fn write(&self, data: &[u8]) -> AudioResult<usize>;
}

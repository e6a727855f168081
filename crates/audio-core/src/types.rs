//! Core types shared by the capture and playback paths

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sample rates accepted verbatim by the platform gateway.
///
/// 82000 Hz is carried for compatibility with existing callers even though
/// it is not a standard PCM rate; most devices will refuse to open it.
pub const SUPPORTED_SAMPLE_RATES: [u32; 13] = [
    8000, 11025, 12000, 16000, 22050, 24000, 32000, 44100, 48000, 64000, 82000, 96000, 192000,
];

/// Rate substituted for anything outside [`SUPPORTED_SAMPLE_RATES`]
pub const FALLBACK_SAMPLE_RATE: u32 = 16000;

/// Map a requested sample rate onto the whitelist.
///
/// Idempotent: `normalize_sample_rate(normalize_sample_rate(r)) == normalize_sample_rate(r)`.
pub fn normalize_sample_rate(rate: u32) -> u32 {
    if SUPPORTED_SAMPLE_RATES.contains(&rate) {
        rate
    } else {
        FALLBACK_SAMPLE_RATE
    }
}

/// Channel layout of a PCM stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelLayout {
    /// One channel
    Mono,
    /// Two interleaved channels
    Stereo,
}

impl ChannelLayout {
    /// Number of interleaved channels
    pub fn count(&self) -> u16 {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }
}

/// Linear PCM sample width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum SampleBits {
    /// 8-bit unsigned PCM
    Eight,
    /// 16-bit signed PCM
    Sixteen,
}

impl SampleBits {
    /// Bytes per sample
    pub fn bytes(&self) -> usize {
        match self {
            SampleBits::Eight => 1,
            SampleBits::Sixteen => 2,
        }
    }
}

impl From<SampleBits> for u16 {
    fn from(bits: SampleBits) -> u16 {
        match bits {
            SampleBits::Eight => 8,
            SampleBits::Sixteen => 16,
        }
    }
}

impl TryFrom<u16> for SampleBits {
    type Error = String;

    fn try_from(bits: u16) -> Result<Self, Self::Error> {
        match bits {
            8 => Ok(SampleBits::Eight),
            16 => Ok(SampleBits::Sixteen),
            other => Err(format!("unsupported sample width: {} bits", other)),
        }
    }
}

/// Direction of a platform audio stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamDirection {
    /// Microphone source
    Input,
    /// Speaker / earpiece sink
    Output,
}

/// Audio format specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormatSpec {
    /// Sample rate in Hz
    pub sample_rate_hz: u32,
    /// Channel layout
    pub channels: ChannelLayout,
    /// Sample width
    pub sample_bits: SampleBits,
}

impl AudioFormatSpec {
    /// Create a new format. The sample rate is normalized onto the whitelist.
    pub fn new(sample_rate_hz: u32, channels: ChannelLayout, sample_bits: SampleBits) -> Self {
        Self {
            sample_rate_hz: normalize_sample_rate(sample_rate_hz),
            channels,
            sample_bits,
        }
    }

    /// 44.1 kHz mono 16-bit, the format used for headset recording
    pub fn cd_mono() -> Self {
        Self::new(44100, ChannelLayout::Mono, SampleBits::Sixteen)
    }

    /// 8 kHz mono 16-bit, the narrowband SCO voice format
    pub fn narrowband_voice() -> Self {
        Self::new(8000, ChannelLayout::Mono, SampleBits::Sixteen)
    }

    /// Copy of this format with the sample rate normalized
    pub fn normalized(&self) -> Self {
        Self {
            sample_rate_hz: normalize_sample_rate(self.sample_rate_hz),
            ..*self
        }
    }

    /// Whether the sample rate is on the whitelist
    pub fn is_supported_rate(&self) -> bool {
        SUPPORTED_SAMPLE_RATES.contains(&self.sample_rate_hz)
    }

    /// Bytes per interleaved sample frame
    pub fn bytes_per_frame(&self) -> usize {
        self.channels.count() as usize * self.sample_bits.bytes()
    }

    /// Bytes per second of audio
    pub fn byte_rate(&self) -> usize {
        self.sample_rate_hz as usize * self.bytes_per_frame()
    }
}

impl Default for AudioFormatSpec {
    fn default() -> Self {
        Self::cd_mono()
    }
}

impl fmt::Display for AudioFormatSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Hz/{}ch/{}bit",
            self.sample_rate_hz,
            self.channels.count(),
            u16::from(self.sample_bits)
        )
    }
}

/// One block of PCM bytes handed from the capture side to the playback side.
///
/// Immutable after construction; ownership moves to the consumer on hand-off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmFrame {
    bytes: Bytes,
}

impl PcmFrame {
    /// Wrap already-owned bytes
    pub fn new(bytes: Bytes) -> Self {
        Self { bytes }
    }

    /// Copy the first `len` bytes out of a reused capture buffer
    pub fn copy_from(data: &[u8], len: usize) -> Self {
        let len = len.min(data.len());
        Self {
            bytes: Bytes::copy_from_slice(&data[..len]),
        }
    }

    /// Frame payload
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the frame carries no audio
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Consume the frame and return its payload
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

/// Lifecycle of the microphone capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum CaptureState {
    /// Not created, creation failed, or released
    Uninit = 0,
    /// Source allocated and stopped
    Idle = 1,
    /// Capture task is reading frames
    Recording = 2,
}

impl CaptureState {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            1 => CaptureState::Idle,
            2 => CaptureState::Recording,
            _ => CaptureState::Uninit,
        }
    }
}

/// Lifecycle of the PCM player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PlayState {
    /// No output sink allocated
    Uninit = 0,
    /// Output sink allocated, not playing
    Prepare = 1,
    /// Playback task is writing to the sink
    Playing = 2,
    /// Reserved for a paused sink
    Pause = 3,
}

impl PlayState {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            1 => PlayState::Prepare,
            2 => PlayState::Playing,
            3 => PlayState::Pause,
            _ => PlayState::Uninit,
        }
    }
}

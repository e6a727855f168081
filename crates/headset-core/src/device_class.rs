//! Bluetooth Class of Device
//!
//! The Class of Device is a 24-bit field:
//! - Major Service Classes (bits 23-13)
//! - Major Device Class (bits 12-8)
//! - Minor Device Class (bits 7-2)
//! - Format Type (bits 1-0, always 0b00)
//!
//! Only the major and minor device class decide whether a peer counts as a
//! voice headset.

use serde::{Deserialize, Serialize};

/// Major and minor device class bits
pub const DEVICE_CLASS_MASK: u32 = 0x1FFC;

/// Audio/Video major class
pub const MAJOR_AUDIO_VIDEO: u8 = 0x04;

/// Audio/Video, wearable headset
pub const AUDIO_VIDEO_WEARABLE_HEADSET: u32 = 0x0404;

/// Audio/Video, hands-free device
pub const AUDIO_VIDEO_HANDSFREE: u32 = 0x0408;

/// Class of Device reported with a remote device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceClass {
    raw: u32,
}

impl DeviceClass {
    /// Create from the raw 24-bit value
    #[must_use]
    pub fn from_raw(raw: u32) -> Self {
        Self {
            raw: raw & 0xFF_FFFF,
        }
    }

    /// A wearable headset with no service bits set
    #[must_use]
    pub fn wearable_headset() -> Self {
        Self::from_raw(AUDIO_VIDEO_WEARABLE_HEADSET)
    }

    /// A hands-free device with no service bits set
    #[must_use]
    pub fn handsfree() -> Self {
        Self::from_raw(AUDIO_VIDEO_HANDSFREE)
    }

    /// Raw 24-bit value
    #[must_use]
    pub fn raw(&self) -> u32 {
        self.raw
    }

    /// Major and minor class together, service bits stripped
    #[must_use]
    pub fn device_class(&self) -> u32 {
        self.raw & DEVICE_CLASS_MASK
    }

    /// Major Device Class (bits 12-8)
    #[must_use]
    pub fn major(&self) -> u8 {
        ((self.raw >> 8) & 0x1F) as u8
    }

    /// Minor Device Class (bits 7-2)
    #[must_use]
    pub fn minor(&self) -> u8 {
        ((self.raw >> 2) & 0x3F) as u8
    }

    /// Major Service Classes (bits 23-13)
    #[must_use]
    pub fn service_classes(&self) -> u16 {
        ((self.raw >> 13) & 0x7FF) as u16
    }

    /// Whether the device can carry a voice link to us: a hands-free unit
    /// or a wearable headset
    #[must_use]
    pub fn is_voice_headset(&self) -> bool {
        matches!(
            self.device_class(),
            AUDIO_VIDEO_HANDSFREE | AUDIO_VIDEO_WEARABLE_HEADSET
        )
    }
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.device_class() {
            AUDIO_VIDEO_WEARABLE_HEADSET => write!(f, "Audio/Video (Wearable headset)"),
            AUDIO_VIDEO_HANDSFREE => write!(f, "Audio/Video (Hands-free)"),
            _ if self.major() == MAJOR_AUDIO_VIDEO => {
                write!(f, "Audio/Video (minor 0x{:02X})", self.minor())
            }
            _ => write!(f, "CoD 0x{:06X}", self.raw),
        }
    }
}

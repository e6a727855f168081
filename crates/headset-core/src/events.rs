//! Typed headset events and the platform state codes behind them

use serde::{Deserialize, Serialize};

/// Local Bluetooth adapter power state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdapterState {
    Off,
    TurningOn,
    On,
    TurningOff,
}

impl AdapterState {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            10 => Some(Self::Off),
            11 => Some(Self::TurningOn),
            12 => Some(Self::On),
            13 => Some(Self::TurningOff),
            _ => None,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Off => 10,
            Self::TurningOn => 11,
            Self::On => 12,
            Self::TurningOff => 13,
        }
    }
}

/// Headset profile connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeadsetLinkState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl HeadsetLinkState {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Disconnected),
            1 => Some(Self::Connecting),
            2 => Some(Self::Connected),
            3 => Some(Self::Disconnecting),
            _ => None,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Connected => 2,
            Self::Disconnecting => 3,
        }
    }
}

/// Headset audio (media) state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeadsetAudioState {
    Disconnected,
    Connecting,
    Connected,
}

impl HeadsetAudioState {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            10 => Some(Self::Disconnected),
            11 => Some(Self::Connecting),
            12 => Some(Self::Connected),
            _ => None,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Disconnected => 10,
            Self::Connecting => 11,
            Self::Connected => 12,
        }
    }
}

/// SCO audio link state as observed from broadcasts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScoLinkState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ScoLinkState {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Disconnected),
            1 => Some(Self::Connected),
            2 => Some(Self::Connecting),
            -1 => Some(Self::Error),
            _ => None,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Disconnected => 0,
            Self::Connected => 1,
            Self::Connecting => 2,
            Self::Error => -1,
        }
    }
}

impl std::fmt::Display for ScoLinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "DISCONNECTED"),
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Connected => write!(f, "CONNECTED"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Normalized headset event consumed by the SCO controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HeadsetEvent {
    /// Baseband link up to a voice-capable headset
    AclConnected,
    /// Baseband link down
    AclDisconnected,
    /// Headset profile connected
    HeadsetConnected { device_id: String },
    /// Headset profile disconnected
    HeadsetDisconnected { device_id: String },
    /// Headset media audio connected
    A2dpConnected,
    /// Headset media audio disconnected
    A2dpDisconnected,
    /// SCO link is being established
    ScoConnecting,
    /// SCO link established by the current bring-up
    ScoConnected,
    /// SCO link dropped
    ScoDisconnected,
    /// SCO link reported up without being brought up; must be reopened
    ScoRetry,
    /// Headset battery report, 0.1 to 1.0
    VendorBattery { level: f32 },
}

impl HeadsetEvent {
    /// Short name for log fields
    pub fn name(&self) -> &'static str {
        match self {
            Self::AclConnected => "acl_connected",
            Self::AclDisconnected => "acl_disconnected",
            Self::HeadsetConnected { .. } => "headset_connected",
            Self::HeadsetDisconnected { .. } => "headset_disconnected",
            Self::A2dpConnected => "a2dp_connected",
            Self::A2dpDisconnected => "a2dp_disconnected",
            Self::ScoConnecting => "sco_connecting",
            Self::ScoConnected => "sco_connected",
            Self::ScoDisconnected => "sco_disconnected",
            Self::ScoRetry => "sco_retry",
            Self::VendorBattery { .. } => "vendor_battery",
        }
    }
}

//! Controller lifecycle states
//!
//! ```text
//!            start, headset present
//!  IDLE ──────────────────────────────▶ BRINGING_UP ◀─┐ ScoRetry
//!   │                                    │  │  │  └────┘
//!   │ start, no headset   HeadsetConnected  │  │ ScoConnected
//!   ▼                                    │  │  ▼
//!  WAIT_HEADSET ─────────────────────────┘  │  UP
//!   ▲   ▲              horizon exhausted    │  │
//!   │   └───────────────────────────────────┘  │ ScoDisconnected
//!   └──────────────────────────────────────────┘
//!
//!  any ──stop──▶ TEARING_DOWN ──▶ IDLE
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ControllerState {
    /// Not started
    Idle = 0,
    /// Started, no bring-up in progress
    WaitHeadset = 1,
    /// Retry timer armed, waiting for the link
    BringingUp = 2,
    /// SCO link up and routed
    Up = 3,
    /// `stop` in progress
    TearingDown = 4,
}

impl ControllerState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::WaitHeadset,
            2 => Self::BringingUp,
            3 => Self::Up,
            4 => Self::TearingDown,
            _ => Self::Idle,
        }
    }
}

impl std::fmt::Display for ControllerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::WaitHeadset => write!(f, "WAIT_HEADSET"),
            Self::BringingUp => write!(f, "BRINGING_UP"),
            Self::Up => write!(f, "UP"),
            Self::TearingDown => write!(f, "TEARING_DOWN"),
        }
    }
}

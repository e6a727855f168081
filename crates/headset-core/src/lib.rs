//! # scolink-headset-core
//!
//! Bluetooth headset event handling and SCO voice link control.
//!
//! ```text
//!  BluetoothPlatform ──broadcasts──▶ HeadsetEventDemux ──HeadsetEvent──▶ ScoController
//!        ▲                            (dispatcher task)     (event loop + retry timer)
//!        └──────── audio mode, SCO start/stop, SCO routing ───────────────┘
//!                                                                         │
//!                                                                   ScoListener
//! ```
//!
//! - [`platform`]: the host capability the controller drives
//! - [`broadcast`]: raw broadcast model and receiver filters
//! - [`demux`]: broadcast decoding, SCO retry detection, deduplication
//! - [`controller`]: SCO bring-up state machine and listener fan-out
//! - [`testing`]: scriptable platform for tests and demos
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use scolink_headset_core::{FakeBluetoothPlatform, ScoController};
//!
//! # async fn example() {
//! let platform = Arc::new(FakeBluetoothPlatform::new().with_headset_input().with_auto_connect());
//! let controller = ScoController::new(platform);
//! if controller.start().await {
//!     // bring-up running; listeners hear ScoAudioConnected when the link is up
//! }
//! controller.stop().await;
//! # }
//! ```

pub mod broadcast;
pub mod config;
pub mod controller;
pub mod demux;
pub mod device_class;
pub mod error;
pub mod events;
pub mod platform;
pub mod testing;
pub mod vendor;

pub use broadcast::{Broadcast, BroadcastAction, BroadcastFilter, RemoteDevice, VendorArg, VendorCommand};
pub use config::ScoConfig;
pub use controller::{ControllerState, ScoController, ScoEvent, ScoListener};
pub use demux::{BATTERY_UNKNOWN, HeadsetEventDemux};
pub use device_class::DeviceClass;
pub use error::{HeadsetError, HeadsetResult};
pub use events::{AdapterState, HeadsetAudioState, HeadsetEvent, HeadsetLinkState, ScoLinkState};
pub use platform::{AudioMode, BluetoothPlatform, InputDeviceType};
pub use testing::FakeBluetoothPlatform;
pub use vendor::parse_battery_level;

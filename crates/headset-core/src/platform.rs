//! Bluetooth and audio-routing capability of the host platform
//!
//! The audio mode and the SCO-on flag are process-wide. Only the SCO
//! controller mutates them, and only through this trait, so tests can
//! substitute [`FakeBluetoothPlatform`](crate::testing::FakeBluetoothPlatform).

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::broadcast::{Broadcast, BroadcastFilter, RemoteDevice};
use crate::error::HeadsetResult;

/// Host audio routing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioMode {
    /// Media playback routing
    Normal,
    /// Voice communication routing, needed for SCO capture
    InCommunication,
}

/// Kind of an audio input device currently offered by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputDeviceType {
    BuiltinMic,
    WiredHeadset,
    UsbDevice,
    BluetoothSco,
    BluetoothA2dp,
    Other(i32),
}

impl InputDeviceType {
    /// Whether this input belongs to a Bluetooth headset
    pub fn is_bluetooth_headset(&self) -> bool {
        matches!(self, Self::BluetoothSco | Self::BluetoothA2dp)
    }
}

/// Bluetooth adapter, audio manager and broadcast registry of the host
pub trait BluetoothPlatform: Send + Sync {
    /// Whether the device has a Bluetooth adapter at all
    fn has_adapter(&self) -> bool;

    /// Whether SCO can be used outside of a phone call
    fn is_sco_available_off_call(&self) -> bool;

    fn set_mode(&self, mode: AudioMode);

    fn mode(&self) -> AudioMode;

    /// Ask the platform to bring the SCO link up. Progress is reported
    /// through SCO state broadcasts.
    fn start_bluetooth_sco(&self) -> HeadsetResult<()>;

    fn stop_bluetooth_sco(&self);

    /// Route audio through SCO
    fn set_bluetooth_sco_on(&self, on: bool);

    fn is_bluetooth_sco_on(&self) -> bool;

    /// Input devices currently available
    fn input_devices(&self) -> Vec<InputDeviceType>;

    /// Best-effort battery level of a remote device, 0..=100.
    /// Platforms without the capability return `None`.
    fn battery_level(&self, _device: &RemoteDevice) -> Option<i32> {
        None
    }

    /// Subscribe to broadcasts matching `filter`. Dropping the receiver
    /// unregisters it.
    fn register_receiver(&self, filter: BroadcastFilter) -> mpsc::UnboundedReceiver<Broadcast>;
}

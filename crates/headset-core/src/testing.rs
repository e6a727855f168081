//! In-memory Bluetooth platform for tests and demos
//!
//! [`FakeBluetoothPlatform`] records every call the controller makes and
//! delivers injected broadcasts to matching receivers. With
//! [`with_auto_connect`](FakeBluetoothPlatform::with_auto_connect) it also
//! plays the headset's part: a start request is answered with SCO
//! `CONNECTING` then `CONNECTED`, and a stop of a live link with
//! `DISCONNECTED`.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

use crate::broadcast::{Broadcast, BroadcastFilter, RemoteDevice};
use crate::device_class::DeviceClass;
use crate::error::{HeadsetError, HeadsetResult};
use crate::events::{HeadsetLinkState, ScoLinkState};
use crate::platform::{AudioMode, BluetoothPlatform, InputDeviceType};

/// Address used by [`FakeBluetoothPlatform::default_headset`]
pub const FAKE_HEADSET_ADDRESS: &str = "00:1A:7D:DA:71:13";

struct FakeState {
    has_adapter: bool,
    sco_available_off_call: bool,
    auto_connect: bool,
    reject_start: bool,
    mode: AudioMode,
    mode_history: Vec<AudioMode>,
    sco_on: bool,
    link: ScoLinkState,
    start_calls: Vec<Instant>,
    stop_calls: usize,
    input_devices: Vec<InputDeviceType>,
    battery_levels: HashMap<String, i32>,
    receivers: Vec<(BroadcastFilter, mpsc::UnboundedSender<Broadcast>)>,
}

/// Scriptable [`BluetoothPlatform`]
pub struct FakeBluetoothPlatform {
    state: Mutex<FakeState>,
}

impl Default for FakeBluetoothPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBluetoothPlatform {
    /// Adapter present, SCO available off call, no headset input
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                has_adapter: true,
                sco_available_off_call: true,
                auto_connect: false,
                reject_start: false,
                mode: AudioMode::Normal,
                mode_history: Vec::new(),
                sco_on: false,
                link: ScoLinkState::Disconnected,
                start_calls: Vec::new(),
                stop_calls: 0,
                input_devices: vec![InputDeviceType::BuiltinMic],
                battery_levels: HashMap::new(),
                receivers: Vec::new(),
            }),
        }
    }

    pub fn without_adapter(self) -> Self {
        self.state.lock().has_adapter = false;
        self
    }

    pub fn without_sco_off_call(self) -> Self {
        self.state.lock().sco_available_off_call = false;
        self
    }

    /// Start with a headset input present
    pub fn with_headset_input(self) -> Self {
        self.add_input(InputDeviceType::BluetoothSco);
        self
    }

    /// Answer start requests like a cooperative headset
    pub fn with_auto_connect(self) -> Self {
        self.state.lock().auto_connect = true;
        self
    }

    /// A wearable headset with a name
    pub fn default_headset() -> RemoteDevice {
        RemoteDevice::new(FAKE_HEADSET_ADDRESS)
            .with_name("Fake Headset")
            .with_class(DeviceClass::wearable_headset())
    }

    pub fn add_input(&self, device: InputDeviceType) {
        let mut state = self.state.lock();
        if !state.input_devices.contains(&device) {
            state.input_devices.push(device);
        }
    }

    pub fn remove_input(&self, device: InputDeviceType) {
        self.state.lock().input_devices.retain(|d| *d != device);
    }

    /// Make `start_bluetooth_sco` fail until reset
    pub fn reject_sco_start(&self, reject: bool) {
        self.state.lock().reject_start = reject;
    }

    pub fn set_battery_level(&self, address: impl Into<String>, level: i32) {
        self.state.lock().battery_levels.insert(address.into(), level);
    }

    /// Deliver a broadcast to every matching live receiver. Returns the
    /// number of deliveries.
    pub fn send(&self, broadcast: Broadcast) -> usize {
        Self::deliver(&mut self.state.lock(), broadcast)
    }

    fn deliver(state: &mut FakeState, broadcast: Broadcast) -> usize {
        state.receivers.retain(|(_, tx)| !tx.is_closed());
        let mut delivered = 0;
        for (filter, tx) in &state.receivers {
            if filter.matches(&broadcast) && tx.send(broadcast.clone()).is_ok() {
                delivered += 1;
            }
        }
        debug!(action = %broadcast.action, delivered, "fake broadcast");
        delivered
    }

    /// Broadcast a SCO state code
    pub fn send_sco_state(&self, state: ScoLinkState) -> usize {
        let mut fake = self.state.lock();
        fake.link = state;
        Self::deliver(&mut fake, Broadcast::sco_audio(state.code()))
    }

    /// Headset profile connects: the input appears and the profile
    /// broadcast is sent
    pub fn connect_headset(&self, device: RemoteDevice) -> usize {
        self.add_input(InputDeviceType::BluetoothSco);
        self.send(Broadcast::headset_connection(
            HeadsetLinkState::Connected.code(),
            device,
        ))
    }

    /// Headset profile disconnects: the input disappears and the profile
    /// broadcast is sent
    pub fn disconnect_headset(&self, device: RemoteDevice) -> usize {
        self.remove_input(InputDeviceType::BluetoothSco);
        self.remove_input(InputDeviceType::BluetoothA2dp);
        self.send(Broadcast::headset_connection(
            HeadsetLinkState::Disconnected.code(),
            device,
        ))
    }

    pub fn mode_history(&self) -> Vec<AudioMode> {
        self.state.lock().mode_history.clone()
    }

    pub fn start_sco_calls(&self) -> usize {
        self.state.lock().start_calls.len()
    }

    /// When each `start_bluetooth_sco` call happened
    pub fn start_sco_times(&self) -> Vec<Instant> {
        self.state.lock().start_calls.clone()
    }

    pub fn stop_sco_calls(&self) -> usize {
        self.state.lock().stop_calls
    }

    pub fn link_state(&self) -> ScoLinkState {
        self.state.lock().link
    }

    /// Receivers whose subscriber is still alive
    pub fn receiver_count(&self) -> usize {
        self.state
            .lock()
            .receivers
            .iter()
            .filter(|(_, tx)| !tx.is_closed())
            .count()
    }
}

impl BluetoothPlatform for FakeBluetoothPlatform {
    fn has_adapter(&self) -> bool {
        self.state.lock().has_adapter
    }

    fn is_sco_available_off_call(&self) -> bool {
        self.state.lock().sco_available_off_call
    }

    fn set_mode(&self, mode: AudioMode) {
        let mut state = self.state.lock();
        state.mode = mode;
        state.mode_history.push(mode);
    }

    fn mode(&self) -> AudioMode {
        self.state.lock().mode
    }

    fn start_bluetooth_sco(&self) -> HeadsetResult<()> {
        let mut state = self.state.lock();
        state.start_calls.push(Instant::now());
        if state.reject_start {
            return Err(HeadsetError::platform("sco start rejected"));
        }
        if state.auto_connect && state.link != ScoLinkState::Connected {
            state.link = ScoLinkState::Connecting;
            Self::deliver(&mut state, Broadcast::sco_audio(ScoLinkState::Connecting.code()));
            state.link = ScoLinkState::Connected;
            Self::deliver(&mut state, Broadcast::sco_audio(ScoLinkState::Connected.code()));
        }
        Ok(())
    }

    fn stop_bluetooth_sco(&self) {
        let mut state = self.state.lock();
        state.stop_calls += 1;
        if state.auto_connect && state.link != ScoLinkState::Disconnected {
            state.link = ScoLinkState::Disconnected;
            Self::deliver(&mut state, Broadcast::sco_audio(ScoLinkState::Disconnected.code()));
        }
    }

    fn set_bluetooth_sco_on(&self, on: bool) {
        self.state.lock().sco_on = on;
    }

    fn is_bluetooth_sco_on(&self) -> bool {
        self.state.lock().sco_on
    }

    fn input_devices(&self) -> Vec<InputDeviceType> {
        self.state.lock().input_devices.clone()
    }

    fn battery_level(&self, device: &RemoteDevice) -> Option<i32> {
        self.state.lock().battery_levels.get(&device.address).copied()
    }

    fn register_receiver(&self, filter: BroadcastFilter) -> mpsc::UnboundedReceiver<Broadcast> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.lock().receivers.push((filter, tx));
        rx
    }
}

impl std::fmt::Debug for FakeBluetoothPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("FakeBluetoothPlatform")
            .field("mode", &state.mode)
            .field("sco_on", &state.sco_on)
            .field("link", &state.link)
            .field("start_calls", &state.start_calls.len())
            .field("stop_calls", &state.stop_calls)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::BroadcastAction;

    #[tokio::test]
    async fn test_delivery_follows_filters() {
        let platform = FakeBluetoothPlatform::new();
        let mut sco = platform
            .register_receiver(BroadcastFilter::new().add_action(BroadcastAction::ScoAudioStateUpdated));
        let other = platform
            .register_receiver(BroadcastFilter::new().add_action(BroadcastAction::AclConnected));

        assert_eq!(platform.send(Broadcast::sco_audio(2)), 1);
        assert_eq!(sco.recv().await, Some(Broadcast::sco_audio(2)));

        drop(other);
        assert_eq!(platform.receiver_count(), 1);
    }

    #[tokio::test]
    async fn test_auto_connect_answers_start() {
        let platform = FakeBluetoothPlatform::new().with_auto_connect();
        let mut sco = platform
            .register_receiver(BroadcastFilter::new().add_action(BroadcastAction::ScoAudioStateUpdated));

        platform.start_bluetooth_sco().unwrap();
        platform.start_bluetooth_sco().unwrap();
        platform.stop_bluetooth_sco();

        assert_eq!(sco.recv().await.unwrap().state, Some(2));
        assert_eq!(sco.recv().await.unwrap().state, Some(1));
        assert_eq!(sco.recv().await.unwrap().state, Some(0));
        assert!(sco.try_recv().is_err());
        assert_eq!(platform.start_sco_calls(), 2);
    }

    #[test]
    fn test_rejected_start_is_recorded() {
        let platform = FakeBluetoothPlatform::new();
        platform.reject_sco_start(true);
        assert!(platform.start_bluetooth_sco().is_err());
        assert_eq!(platform.start_sco_calls(), 1);
    }
}

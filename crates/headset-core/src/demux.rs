//! Headset event demultiplexer
//!
//! Registers two receivers with the platform: a main filter covering the
//! adapter, ACL, headset profile, headset audio and SCO broadcasts, and a
//! vendor filter for accessory events categorized under the Apple company
//! id. Both filters accept uncategorized vendor events, so those arrive
//! twice; the dispatcher drops the second receiver's copy when it arrives
//! within the dedupe window of the first.
//!
//! Each surviving broadcast is decoded by [`HeadsetEventDemux::on_receive`]
//! and, if it yields a [`HeadsetEvent`], forwarded to the registered sink.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use crate::broadcast::{
    Broadcast, BroadcastAction, BroadcastFilter, COMPANY_ID_APPLE, RemoteDevice,
};
use crate::error::HeadsetError;
use crate::events::{
    AdapterState, HeadsetAudioState, HeadsetEvent, HeadsetLinkState, ScoLinkState,
};
use crate::platform::BluetoothPlatform;

/// Returned by [`HeadsetEventDemux::probe_battery_level`] when the level
/// cannot be read
pub const BATTERY_UNKNOWN: i32 = -1;

/// Filter for every broadcast the demux decodes
pub fn main_filter() -> BroadcastFilter {
    BroadcastAction::ALL
        .iter()
        .fold(BroadcastFilter::new(), |filter, action| filter.add_action(*action))
}

/// Filter for categorized accessory events
pub fn vendor_filter() -> BroadcastFilter {
    BroadcastFilter::new()
        .add_action(BroadcastAction::VendorSpecificHeadsetEvent)
        .add_company_category(COMPANY_ID_APPLE)
}

struct Registration {
    context: String,
    platform: Arc<dyn BluetoothPlatform>,
    dispatcher: JoinHandle<()>,
}

struct DemuxInner {
    dedupe_window: Duration,
    sco_state: Mutex<ScoLinkState>,
    last_battery: Mutex<Option<f32>>,
    registration: Mutex<Option<Registration>>,
}

impl Drop for DemuxInner {
    fn drop(&mut self) {
        if let Some(registration) = self.registration.get_mut().take() {
            registration.dispatcher.abort();
        }
    }
}

/// Turns raw platform broadcasts into [`HeadsetEvent`]s
pub struct HeadsetEventDemux {
    inner: Arc<DemuxInner>,
}

impl HeadsetEventDemux {
    /// Create an unregistered demux
    pub fn new(dedupe_window: Duration) -> Self {
        Self {
            inner: Arc::new(DemuxInner {
                dedupe_window,
                sco_state: Mutex::new(ScoLinkState::Disconnected),
                last_battery: Mutex::new(None),
                registration: Mutex::new(None),
            }),
        }
    }

    /// Subscribe to the platform and forward decoded events to `sink`.
    ///
    /// Rejected when the platform has no Bluetooth adapter, or when
    /// `context` is already the registered context. Registering a
    /// different context replaces the previous registration.
    pub fn register(
        &self,
        context: impl Into<String>,
        platform: Arc<dyn BluetoothPlatform>,
        sink: mpsc::UnboundedSender<HeadsetEvent>,
    ) -> bool {
        let context = context.into();
        if !platform.has_adapter() {
            warn!("headset receiver not registered: {}", HeadsetError::unsupported("no bluetooth adapter"));
            return false;
        }

        let mut registration = self.inner.registration.lock();
        if let Some(current) = registration.as_ref() {
            if current.context == context {
                debug!(
                    "headset receiver not registered: {}",
                    HeadsetError::AlreadyRegistered { context }
                );
                return false;
            }
        }
        if let Some(previous) = registration.take() {
            debug!(context = %previous.context, "replacing headset receiver");
            previous.dispatcher.abort();
        }

        let main = platform.register_receiver(main_filter());
        let vendor = platform.register_receiver(vendor_filter());
        let dispatcher = tokio::spawn(dispatch(
            Arc::downgrade(&self.inner),
            main,
            vendor,
            sink,
            self.inner.dedupe_window,
        ));

        info!(%context, "headset receiver registered");
        *registration = Some(Registration {
            context,
            platform,
            dispatcher,
        });
        true
    }

    /// Drop the platform subscriptions. Safe to call when not registered.
    pub fn unregister(&self) {
        if let Some(registration) = self.inner.registration.lock().take() {
            registration.dispatcher.abort();
            info!(context = %registration.context, "headset receiver unregistered");
        }
    }

    pub fn is_registered(&self) -> bool {
        self.inner.registration.lock().is_some()
    }

    /// Decode one broadcast, updating the tracked SCO state
    pub fn on_receive(&self, broadcast: &Broadcast) -> Option<HeadsetEvent> {
        self.inner.on_receive(broadcast)
    }

    /// Last SCO state seen in a broadcast
    pub fn sco_state(&self) -> ScoLinkState {
        *self.inner.sco_state.lock()
    }

    /// Last battery level reported through a vendor event
    pub fn last_battery_level(&self) -> Option<f32> {
        *self.inner.last_battery.lock()
    }

    /// Ask the registered platform for a device's battery level,
    /// [`BATTERY_UNKNOWN`] if it cannot tell
    pub fn probe_battery_level(&self, device: &RemoteDevice) -> i32 {
        self.inner.probe_battery_level(device)
    }
}

impl std::fmt::Debug for HeadsetEventDemux {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadsetEventDemux")
            .field("registered", &self.is_registered())
            .field("sco_state", &self.sco_state())
            .finish()
    }
}

impl DemuxInner {
    fn probe_battery_level(&self, device: &RemoteDevice) -> i32 {
        let platform = self
            .registration
            .lock()
            .as_ref()
            .map(|registration| registration.platform.clone());
        platform
            .and_then(|platform| platform.battery_level(device))
            .unwrap_or(BATTERY_UNKNOWN)
    }

    fn on_receive(&self, broadcast: &Broadcast) -> Option<HeadsetEvent> {
        match broadcast.action {
            BroadcastAction::AdapterStateChanged => {
                let code = broadcast.state.unwrap_or(AdapterState::Off.code());
                match AdapterState::from_code(code) {
                    Some(state) => info!(?state, "bluetooth adapter state changed"),
                    None => debug!(code, "unknown adapter state"),
                }
                None
            }
            BroadcastAction::AclConnected => {
                let device = self.require_device(broadcast)?;
                debug!(device = device.display_name(), "acl connected");
                if self.is_voice_headset(device) {
                    Some(HeadsetEvent::AclConnected)
                } else {
                    None
                }
            }
            BroadcastAction::AclDisconnectRequested => {
                debug!("acl disconnect requested");
                None
            }
            BroadcastAction::AclDisconnected => {
                debug!("acl disconnected");
                Some(HeadsetEvent::AclDisconnected)
            }
            BroadcastAction::HeadsetConnectionStateChanged => self.on_headset_connection(broadcast),
            BroadcastAction::HeadsetAudioStateChanged => {
                let code = broadcast.state.unwrap_or(-1);
                match HeadsetAudioState::from_code(code) {
                    Some(HeadsetAudioState::Connected) => {
                        info!("headset audio connected");
                        Some(HeadsetEvent::A2dpConnected)
                    }
                    Some(HeadsetAudioState::Disconnected) => {
                        info!("headset audio disconnected");
                        Some(HeadsetEvent::A2dpDisconnected)
                    }
                    Some(HeadsetAudioState::Connecting) => {
                        debug!("headset audio connecting");
                        None
                    }
                    None => {
                        debug!(code, "unknown headset audio state");
                        None
                    }
                }
            }
            BroadcastAction::ScoAudioStateUpdated => self.on_sco_state(broadcast),
            BroadcastAction::VendorSpecificHeadsetEvent => self.on_vendor_event(broadcast),
        }
    }

    fn require_device<'a>(&self, broadcast: &'a Broadcast) -> Option<&'a RemoteDevice> {
        if broadcast.device.is_none() {
            warn!(
                "{}",
                HeadsetError::broadcast_parse(broadcast.action.as_str(), "missing device")
            );
        }
        broadcast.device.as_ref()
    }

    fn is_voice_headset(&self, device: &RemoteDevice) -> bool {
        match device.class {
            Some(class) if class.is_voice_headset() => true,
            Some(class) => {
                debug!(device = device.display_name(), %class, "ignoring non-headset device");
                false
            }
            None => {
                debug!(device = device.display_name(), "ignoring device without class");
                false
            }
        }
    }

    fn on_headset_connection(&self, broadcast: &Broadcast) -> Option<HeadsetEvent> {
        let device = self.require_device(broadcast)?;
        let code = broadcast.state.unwrap_or(-1);
        let Some(state) = HeadsetLinkState::from_code(code) else {
            debug!(code, device = device.display_name(), "unknown headset state");
            return None;
        };

        match state {
            HeadsetLinkState::Connected => {
                let battery = self.probe_battery_level(device);
                info!(device = device.display_name(), battery, "headset connected");
                if !self.is_voice_headset(device) {
                    return None;
                }
                Some(HeadsetEvent::HeadsetConnected {
                    device_id: device.address.clone(),
                })
            }
            HeadsetLinkState::Disconnected => {
                info!(device = device.display_name(), "headset disconnected");
                Some(HeadsetEvent::HeadsetDisconnected {
                    device_id: device.address.clone(),
                })
            }
            HeadsetLinkState::Connecting | HeadsetLinkState::Disconnecting => {
                debug!(?state, device = device.display_name(), "headset link changing");
                None
            }
        }
    }

    fn on_sco_state(&self, broadcast: &Broadcast) -> Option<HeadsetEvent> {
        let code = broadcast.state.unwrap_or(ScoLinkState::Error.code());
        let Some(state) = ScoLinkState::from_code(code) else {
            warn!(
                "{}",
                HeadsetError::broadcast_parse(
                    broadcast.action.as_str(),
                    format!("unknown sco state {}", code)
                )
            );
            return None;
        };

        let previous = std::mem::replace(&mut *self.sco_state.lock(), state);
        info!(%previous, %state, "sco audio state updated");

        match state {
            ScoLinkState::Connected if previous == ScoLinkState::Connecting => {
                Some(HeadsetEvent::ScoConnected)
            }
            ScoLinkState::Connected => {
                // A link left open by an earlier session comes back without
                // the connecting step and has to be reopened.
                warn!(
                    "{}, requesting retry",
                    HeadsetError::StaleSession {
                        previous: previous.to_string()
                    }
                );
                Some(HeadsetEvent::ScoRetry)
            }
            ScoLinkState::Connecting => Some(HeadsetEvent::ScoConnecting),
            ScoLinkState::Disconnected => Some(HeadsetEvent::ScoDisconnected),
            ScoLinkState::Error => None,
        }
    }

    fn on_vendor_event(&self, broadcast: &Broadcast) -> Option<HeadsetEvent> {
        let Some(command) = broadcast.vendor.as_ref() else {
            warn!(
                "{}",
                HeadsetError::broadcast_parse(broadcast.action.as_str(), "missing command")
            );
            return None;
        };
        debug!(
            command = %command.command,
            command_type = command.command_type,
            "vendor headset event"
        );

        match command.battery_level() {
            Ok(Some(level)) => {
                info!(level, "headset battery");
                *self.last_battery.lock() = Some(level);
                Some(HeadsetEvent::VendorBattery { level })
            }
            Ok(None) => None,
            Err(e) => {
                warn!("dropping vendor event: {}", e);
                None
            }
        }
    }
}

/// Which platform subscription a broadcast came through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Receiver {
    Main,
    Vendor,
}

/// Pairs up the two copies of a broadcast that both filters accept.
///
/// A broadcast admitted from one receiver is remembered only if the other
/// filter also matches it; the other receiver's copy arriving within the
/// window is then dropped. Repeats through the same receiver are always
/// admitted, so a state that flips away and back is never lost.
struct RecentBroadcasts {
    window: Duration,
    main: BroadcastFilter,
    vendor: BroadcastFilter,
    pending: VecDeque<(Receiver, u64, Instant)>,
}

impl RecentBroadcasts {
    fn new(window: Duration) -> Self {
        Self {
            window,
            main: main_filter(),
            vendor: vendor_filter(),
            pending: VecDeque::new(),
        }
    }

    fn other_filter(&self, source: Receiver) -> &BroadcastFilter {
        match source {
            Receiver::Main => &self.vendor,
            Receiver::Vendor => &self.main,
        }
    }

    /// Returns false if `broadcast` is the second copy of one the other
    /// receiver delivered within the window
    fn admit(&mut self, source: Receiver, broadcast: &Broadcast) -> bool {
        if self.window.is_zero() || !self.other_filter(source).matches(broadcast) {
            return true;
        }
        let now = Instant::now();
        while let Some((_, _, at)) = self.pending.front() {
            if now.duration_since(*at) < self.window {
                break;
            }
            self.pending.pop_front();
        }

        let fingerprint = broadcast.fingerprint();
        let copy = self
            .pending
            .iter()
            .position(|(from, seen, _)| *from != source && *seen == fingerprint);
        if let Some(index) = copy {
            self.pending.remove(index);
            return false;
        }
        self.pending.push_back((source, fingerprint, now));
        true
    }
}

async fn dispatch(
    demux: Weak<DemuxInner>,
    mut main: mpsc::UnboundedReceiver<Broadcast>,
    mut vendor: mpsc::UnboundedReceiver<Broadcast>,
    sink: mpsc::UnboundedSender<HeadsetEvent>,
    dedupe_window: Duration,
) {
    let mut recent = RecentBroadcasts::new(dedupe_window);
    debug!("headset dispatcher started");

    loop {
        let (source, broadcast) = tokio::select! {
            biased;
            Some(broadcast) = main.recv() => (Receiver::Main, broadcast),
            Some(broadcast) = vendor.recv() => (Receiver::Vendor, broadcast),
            else => break,
        };

        if !recent.admit(source, &broadcast) {
            trace!(action = %broadcast.action, ?source, "dropping duplicate broadcast");
            continue;
        }
        let Some(demux) = demux.upgrade() else { break };
        let Some(event) = demux.on_receive(&broadcast) else {
            continue;
        };
        trace!(event = event.name(), "dispatching headset event");
        if sink.send(event).is_err() {
            debug!("headset event sink closed");
            break;
        }
    }

    debug!("headset dispatcher finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::{VendorArg, VendorCommand};
    use crate::device_class::DeviceClass;

    fn demux() -> HeadsetEventDemux {
        HeadsetEventDemux::new(Duration::from_millis(50))
    }

    fn sco(demux: &HeadsetEventDemux, code: i32) -> Option<HeadsetEvent> {
        demux.on_receive(&Broadcast::sco_audio(code))
    }

    #[test]
    fn test_connected_after_connecting() {
        let demux = demux();
        assert_eq!(sco(&demux, 2), Some(HeadsetEvent::ScoConnecting));
        assert_eq!(sco(&demux, 1), Some(HeadsetEvent::ScoConnected));
        assert_eq!(demux.sco_state(), ScoLinkState::Connected);
    }

    #[test]
    fn test_connected_from_initial_state_is_retry() {
        let demux = demux();
        assert_eq!(sco(&demux, 1), Some(HeadsetEvent::ScoRetry));
        assert_eq!(sco(&demux, 1), Some(HeadsetEvent::ScoRetry));
    }

    #[test]
    fn test_error_state_is_remembered() {
        let demux = demux();
        assert_eq!(sco(&demux, 2), Some(HeadsetEvent::ScoConnecting));
        assert_eq!(sco(&demux, -1), None);
        assert_eq!(sco(&demux, 1), Some(HeadsetEvent::ScoRetry));
    }

    #[test]
    fn test_unknown_sco_code_keeps_state() {
        let demux = demux();
        sco(&demux, 2);
        assert_eq!(sco(&demux, 7), None);
        assert_eq!(sco(&demux, 1), Some(HeadsetEvent::ScoConnected));
    }

    #[test]
    fn test_headset_connect_requires_headset_class() {
        let demux = demux();
        let headset = RemoteDevice::new("00:11:22:33:44:55").with_class(DeviceClass::handsfree());
        let speaker = RemoteDevice::new("00:11:22:33:44:66").with_class(DeviceClass::from_raw(0x0414));

        assert_eq!(
            demux.on_receive(&Broadcast::headset_connection(2, headset.clone())),
            Some(HeadsetEvent::HeadsetConnected {
                device_id: headset.address.clone()
            })
        );
        assert_eq!(demux.on_receive(&Broadcast::headset_connection(2, speaker)), None);
        assert_eq!(demux.on_receive(&Broadcast::headset_connection(1, headset.clone())), None);
        assert_eq!(
            demux.on_receive(&Broadcast::headset_connection(0, headset.clone())),
            Some(HeadsetEvent::HeadsetDisconnected {
                device_id: headset.address
            })
        );
    }

    #[test]
    fn test_vendor_battery_updates_last_level() {
        let demux = demux();
        assert_eq!(demux.last_battery_level(), None);
        let command = VendorCommand::new(
            crate::vendor::IPHONEACCEV,
            2,
            [2, 1, 4, 2, 0].into_iter().map(VendorArg::Int).collect(),
        );
        assert_eq!(
            demux.on_receive(&Broadcast::vendor(command)),
            Some(HeadsetEvent::VendorBattery { level: 0.5 })
        );
        assert_eq!(demux.last_battery_level(), Some(0.5));
    }

    #[test]
    fn test_probe_without_registration_is_unknown() {
        assert_eq!(demux().probe_battery_level(&RemoteDevice::new("x")), BATTERY_UNKNOWN);
    }

    fn uncategorized_vendor() -> Broadcast {
        Broadcast::vendor(VendorCommand::new(crate::vendor::IPHONEACCEV, 2, vec![VendorArg::Int(0)]))
    }

    #[tokio::test(start_paused = true)]
    async fn test_recent_broadcasts_pair_across_receivers() {
        let mut recent = RecentBroadcasts::new(Duration::from_millis(50));
        let broadcast = uncategorized_vendor();
        assert!(recent.admit(Receiver::Main, &broadcast));
        assert!(!recent.admit(Receiver::Vendor, &broadcast));

        // Vendor copy first, then the main copy
        assert!(recent.admit(Receiver::Vendor, &broadcast));
        assert!(!recent.admit(Receiver::Main, &broadcast));

        // A late copy is delivered again
        assert!(recent.admit(Receiver::Main, &broadcast));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(recent.admit(Receiver::Vendor, &broadcast));
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_receiver_repeats_are_admitted() {
        let mut recent = RecentBroadcasts::new(Duration::from_millis(50));
        let connecting = Broadcast::sco_audio(2);
        assert!(recent.admit(Receiver::Main, &connecting));
        assert!(recent.admit(Receiver::Main, &Broadcast::sco_audio(0)));
        assert!(recent.admit(Receiver::Main, &connecting));

        let vendor = uncategorized_vendor();
        assert!(recent.admit(Receiver::Main, &vendor));
        assert!(recent.admit(Receiver::Main, &vendor));
        assert!(!recent.admit(Receiver::Vendor, &vendor));
        assert!(!recent.admit(Receiver::Vendor, &vendor));
    }

    #[test]
    fn test_zero_window_admits_everything() {
        let mut recent = RecentBroadcasts::new(Duration::ZERO);
        let broadcast = uncategorized_vendor();
        assert!(recent.admit(Receiver::Main, &broadcast));
        assert!(recent.admit(Receiver::Vendor, &broadcast));
    }
}

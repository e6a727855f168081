//! Raw platform broadcasts
//!
//! A [`Broadcast`] is what the platform's Bluetooth and audio services
//! deliver to registered receivers: an action plus a few typed extras.
//! The demux turns these into [`HeadsetEvent`](crate::events::HeadsetEvent)s.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::device_class::DeviceClass;

/// Bluetooth SIG company identifier for Apple, owner of `+IPHONEACCEV`
pub const COMPANY_ID_APPLE: u16 = 0x004C;

/// Bluetooth SIG company identifier for Google
pub const COMPANY_ID_GOOGLE: u16 = 0x00E0;

/// Broadcast action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BroadcastAction {
    /// Local adapter turned on or off
    AdapterStateChanged,
    /// Baseband link to a remote device established
    AclConnected,
    /// Remote device is about to drop the baseband link
    AclDisconnectRequested,
    /// Baseband link to a remote device dropped
    AclDisconnected,
    /// Headset profile connection state changed
    HeadsetConnectionStateChanged,
    /// Headset audio state changed
    HeadsetAudioStateChanged,
    /// SCO audio link state changed
    ScoAudioStateUpdated,
    /// Vendor specific AT command from a headset
    VendorSpecificHeadsetEvent,
}

impl BroadcastAction {
    /// Every action the demux listens for
    pub const ALL: [BroadcastAction; 8] = [
        Self::AdapterStateChanged,
        Self::AclConnected,
        Self::AclDisconnectRequested,
        Self::AclDisconnected,
        Self::HeadsetConnectionStateChanged,
        Self::HeadsetAudioStateChanged,
        Self::ScoAudioStateUpdated,
        Self::VendorSpecificHeadsetEvent,
    ];

    /// Platform action string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AdapterStateChanged => "android.bluetooth.adapter.action.STATE_CHANGED",
            Self::AclConnected => "android.bluetooth.device.action.ACL_CONNECTED",
            Self::AclDisconnectRequested => {
                "android.bluetooth.device.action.ACL_DISCONNECT_REQUESTED"
            }
            Self::AclDisconnected => "android.bluetooth.device.action.ACL_DISCONNECTED",
            Self::HeadsetConnectionStateChanged => {
                "android.bluetooth.headset.profile.action.CONNECTION_STATE_CHANGED"
            }
            Self::HeadsetAudioStateChanged => {
                "android.bluetooth.headset.profile.action.AUDIO_STATE_CHANGED"
            }
            Self::ScoAudioStateUpdated => "android.media.ACTION_SCO_AUDIO_STATE_UPDATED",
            Self::VendorSpecificHeadsetEvent => {
                "android.bluetooth.headset.action.VENDOR_SPECIFIC_HEADSET_EVENT"
            }
        }
    }
}

impl std::fmt::Display for BroadcastAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote Bluetooth device attached to a broadcast
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteDevice {
    /// Hardware address, e.g. `00:11:22:AA:BB:CC`
    pub address: String,
    /// Friendly name, when known
    pub name: Option<String>,
    /// Class of Device, when known
    pub class: Option<DeviceClass>,
}

impl RemoteDevice {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
            class: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_class(mut self, class: DeviceClass) -> Self {
        self.class = Some(class);
        self
    }

    /// Name for log lines
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }
}

/// One argument of a vendor AT command
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VendorArg {
    Int(i32),
    Text(String),
}

impl VendorArg {
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Text(_) => None,
        }
    }
}

impl From<i32> for VendorArg {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for VendorArg {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Vendor specific AT command sent by a headset
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VendorCommand {
    /// Command name, e.g. `+IPHONEACCEV`
    pub command: String,
    /// AT command type (read, test, set, ...); -1 when absent
    pub command_type: i32,
    /// Command arguments
    pub args: Vec<VendorArg>,
}

impl VendorCommand {
    pub fn new(command: impl Into<String>, command_type: i32, args: Vec<VendorArg>) -> Self {
        Self {
            command: command.into(),
            command_type,
            args,
        }
    }
}

/// A broadcast as delivered by the platform
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Broadcast {
    pub action: BroadcastAction,
    /// Company category of a vendor event; matched against filter categories
    pub company_id: Option<u16>,
    /// New state code
    pub state: Option<i32>,
    /// Previous state code, when the platform sends one
    pub previous_state: Option<i32>,
    /// Remote device the broadcast is about
    pub device: Option<RemoteDevice>,
    /// Vendor command payload
    pub vendor: Option<VendorCommand>,
}

impl Broadcast {
    /// Bare broadcast with no extras
    pub fn new(action: BroadcastAction) -> Self {
        Self {
            action,
            company_id: None,
            state: None,
            previous_state: None,
            device: None,
            vendor: None,
        }
    }

    pub fn adapter_state(state: i32) -> Self {
        Self::new(BroadcastAction::AdapterStateChanged).with_state(state)
    }

    pub fn acl_connected(device: RemoteDevice) -> Self {
        Self::new(BroadcastAction::AclConnected).with_device(device)
    }

    pub fn acl_disconnect_requested(device: RemoteDevice) -> Self {
        Self::new(BroadcastAction::AclDisconnectRequested).with_device(device)
    }

    pub fn acl_disconnected(device: RemoteDevice) -> Self {
        Self::new(BroadcastAction::AclDisconnected).with_device(device)
    }

    pub fn headset_connection(state: i32, device: RemoteDevice) -> Self {
        Self::new(BroadcastAction::HeadsetConnectionStateChanged)
            .with_state(state)
            .with_device(device)
    }

    pub fn headset_audio(state: i32) -> Self {
        Self::new(BroadcastAction::HeadsetAudioStateChanged).with_state(state)
    }

    pub fn sco_audio(state: i32) -> Self {
        Self::new(BroadcastAction::ScoAudioStateUpdated).with_state(state)
    }

    pub fn vendor(command: VendorCommand) -> Self {
        let mut broadcast = Self::new(BroadcastAction::VendorSpecificHeadsetEvent);
        broadcast.vendor = Some(command);
        broadcast
    }

    pub fn with_state(mut self, state: i32) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_previous_state(mut self, state: i32) -> Self {
        self.previous_state = Some(state);
        self
    }

    pub fn with_device(mut self, device: RemoteDevice) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_company_id(mut self, company_id: u16) -> Self {
        self.company_id = Some(company_id);
        self
    }

    /// Hash of the action and every extra, used to spot double delivery
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// Which broadcasts a receiver wants
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastFilter {
    actions: Vec<BroadcastAction>,
    company_ids: Vec<u16>,
}

impl BroadcastFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_action(mut self, action: BroadcastAction) -> Self {
        if !self.actions.contains(&action) {
            self.actions.push(action);
        }
        self
    }

    /// Accept vendor broadcasts categorized under `company_id`
    pub fn add_company_category(mut self, company_id: u16) -> Self {
        if !self.company_ids.contains(&company_id) {
            self.company_ids.push(company_id);
        }
        self
    }

    pub fn actions(&self) -> &[BroadcastAction] {
        &self.actions
    }

    /// A broadcast matches when its action is listed and its company
    /// category, if it carries one, is listed too.
    pub fn matches(&self, broadcast: &Broadcast) -> bool {
        if !self.actions.contains(&broadcast.action) {
            return false;
        }
        match broadcast.company_id {
            Some(id) => self.company_ids.contains(&id),
            None => true,
        }
    }
}

//! SCO link controller
//!
//! [`ScoController`] brings the SCO voice link to a Bluetooth headset up
//! and keeps the host audio mode in step with it. Bring-up is:
//!
//! 1. clean: SCO routing off, SCO stopped, audio mode `Normal`
//! 2. arm the retry timer; every tick switches the mode to
//!    `InCommunication` and asks the platform to start SCO
//! 3. wait for the demux to report the link connected
//!
//! Headset events and retry ticks are handled one at a time under the
//! controller lock. Listener notifications run after the lock is released.

mod listener;
mod retry;
mod state;

pub use listener::{ScoEvent, ScoListener};
pub use state::ControllerState;

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ScoConfig;
use crate::demux::HeadsetEventDemux;
use crate::error::HeadsetError;
use crate::events::HeadsetEvent;
use crate::platform::{AudioMode, BluetoothPlatform};
use listener::ListenerSet;
use retry::RetryTimer;

static NEXT_CONTROLLER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Default)]
struct Core {
    // Registration the event loop belongs to; None once stopped
    session: Option<u64>,
    next_session: u64,
    retry: Option<RetryTimer>,
    next_generation: u64,
}

pub(crate) struct ControllerInner {
    this: Weak<ControllerInner>,
    platform: Arc<dyn BluetoothPlatform>,
    config: ScoConfig,
    context: String,
    demux: HeadsetEventDemux,
    listeners: ListenerSet,
    state: AtomicU8,
    core: AsyncMutex<Core>,
}

/// Drives the SCO link to a connected headset
#[derive(Clone)]
pub struct ScoController {
    inner: Arc<ControllerInner>,
}

impl ScoController {
    pub fn new(platform: Arc<dyn BluetoothPlatform>) -> Self {
        Self::with_config(platform, ScoConfig::default())
    }

    pub fn with_config(platform: Arc<dyn BluetoothPlatform>, config: ScoConfig) -> Self {
        let id = NEXT_CONTROLLER_ID.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::new_cyclic(|this| ControllerInner {
            this: this.clone(),
            platform,
            demux: HeadsetEventDemux::new(config.dedupe_window()),
            config,
            context: format!("sco-controller-{}", id),
            listeners: ListenerSet::default(),
            state: AtomicU8::new(ControllerState::Idle as u8),
            core: AsyncMutex::new(Core::default()),
        });
        Self { inner }
    }

    /// Start watching the headset and bring SCO up if one is connected.
    ///
    /// Returns true when a bring-up is running or the link is already up.
    /// Returns false without a Bluetooth adapter, when SCO is unavailable
    /// off call, or when no headset is connected yet; in the last case the
    /// controller keeps watching and starts as soon as a headset connects.
    pub async fn start(&self) -> bool {
        let inner = &self.inner;
        let mut core = inner.core.lock().await;
        if inner.is_started() {
            debug!(state = %inner.state(), "start ignored, already started");
            return true;
        }
        info!("start");

        if !inner.platform.has_adapter() {
            warn!("{}", HeadsetError::unsupported("no bluetooth adapter"));
            return false;
        }
        if !inner.platform.is_sco_available_off_call() {
            warn!("{}", HeadsetError::unsupported("sco not available off call"));
            return false;
        }

        if core.session.is_none() {
            let (events_tx, events_rx) = mpsc::unbounded_channel();
            if !inner
                .demux
                .register(inner.context.clone(), inner.platform.clone(), events_tx)
            {
                return false;
            }
            let session = core.next_session;
            core.next_session += 1;
            core.session = Some(session);
            tokio::spawn(event_loop(inner.this.clone(), events_rx, session));
        }

        if inner.is_headset_connected() {
            inner.start_sco(&mut core);
            true
        } else {
            info!("no headset input, waiting for a headset");
            inner.set_state(ControllerState::WaitHeadset);
            false
        }
    }

    /// Tear down: cancel the retry, turn SCO off, restore `Normal` mode and
    /// stop watching the headset. Events still in flight are ignored.
    pub async fn stop(&self) {
        let inner = &self.inner;
        let mut core = inner.core.lock().await;
        info!(state = %inner.state(), "stop");
        inner.set_state(ControllerState::TearingDown);

        inner.cancel_retry(&mut core);
        inner.platform.set_bluetooth_sco_on(false);
        inner.platform.stop_bluetooth_sco();
        inner.platform.set_mode(AudioMode::Normal);

        inner.demux.unregister();
        core.session = None;
        inner.set_state(ControllerState::Idle);
    }

    /// Register a listener. Returns false if it was already registered.
    pub fn add_listener(&self, listener: Arc<dyn ScoListener>) -> bool {
        self.inner.listeners.add(listener)
    }

    /// Unregister a listener. Returns false if it was not registered.
    pub fn remove_listener(&self, listener: &Arc<dyn ScoListener>) -> bool {
        self.inner.listeners.remove(listener)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// A Bluetooth headset input is present and SCO routing is on
    pub fn is_sco_connected(&self) -> bool {
        self.inner.is_headset_connected() && self.inner.platform.is_bluetooth_sco_on()
    }

    pub fn state(&self) -> ControllerState {
        self.inner.state()
    }

    /// A bring-up is running or the link is up
    pub fn is_started(&self) -> bool {
        self.inner.is_started()
    }

    pub fn config(&self) -> &ScoConfig {
        &self.inner.config
    }

    /// Headset event decoder owned by this controller
    pub fn demux(&self) -> &HeadsetEventDemux {
        &self.inner.demux
    }
}

impl std::fmt::Debug for ScoController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoController")
            .field("context", &self.inner.context)
            .field("state", &self.state())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl ControllerInner {
    fn state(&self) -> ControllerState {
        ControllerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: ControllerState) {
        let previous = ControllerState::from_u8(self.state.swap(state as u8, Ordering::SeqCst));
        if previous != state {
            debug!(%previous, %state, "controller state changed");
        }
    }

    fn is_started(&self) -> bool {
        matches!(self.state(), ControllerState::BringingUp | ControllerState::Up)
    }

    // SCO and A2DP inputs both count as a connected headset
    fn is_headset_connected(&self) -> bool {
        self.platform
            .input_devices()
            .iter()
            .any(|device| device.is_bluetooth_headset())
    }

    /// Clean the link, then arm a fresh retry timer
    fn start_sco(&self, core: &mut Core) {
        self.platform.set_bluetooth_sco_on(false);
        self.platform.stop_bluetooth_sco();
        self.platform.set_mode(AudioMode::Normal);

        self.cancel_retry(core);
        core.next_generation += 1;
        core.retry = Some(RetryTimer::arm(
            self.this.clone(),
            core.next_generation,
            &self.config,
        ));
        self.set_state(ControllerState::BringingUp);
        info!(
            horizon_ms = self.config.retry_horizon_ms,
            period_ms = self.config.retry_period_ms,
            "sco bring-up armed"
        );
    }

    fn cancel_retry(&self, core: &mut Core) {
        if let Some(retry) = core.retry.take() {
            debug!(generation = retry.generation(), "retry timer cancelled");
            retry.cancel();
        }
    }

    /// Returns false once the timer has been superseded
    pub(crate) async fn on_retry_tick(&self, generation: u64, tick: u64) -> bool {
        let core = self.core.lock().await;
        if core.retry.as_ref().map(RetryTimer::generation) != Some(generation) {
            return false;
        }
        self.platform.set_mode(AudioMode::InCommunication);
        match self.platform.start_bluetooth_sco() {
            Ok(()) => debug!(tick, "requested bluetooth sco start"),
            Err(e) => warn!(tick, "bluetooth sco start rejected, retrying next tick: {}", e),
        }
        true
    }

    pub(crate) async fn on_retry_expired(&self, generation: u64) {
        let mut core = self.core.lock().await;
        if core.retry.as_ref().map(RetryTimer::generation) != Some(generation) {
            return;
        }
        core.retry = None;
        self.platform.set_mode(AudioMode::Normal);
        self.set_state(ControllerState::WaitHeadset);
        warn!(
            "failed to connect headset audio: {}",
            HeadsetError::timeout("sco bring-up", self.config.retry_horizon_ms)
        );
    }

    async fn handle_event(&self, event: HeadsetEvent, session: u64) {
        let notification = {
            let mut core = self.core.lock().await;
            if core.session != Some(session) {
                debug!(event = event.name(), "ignoring event from a stopped session");
                return;
            }
            self.apply_event(&mut core, event)
        };
        if let Some(notification) = notification {
            self.listeners.notify(notification).await;
        }
    }

    fn apply_event(&self, core: &mut Core, event: HeadsetEvent) -> Option<ScoEvent> {
        match event {
            HeadsetEvent::HeadsetConnected { device_id } => {
                info!(%device_id, "headset connected, starting sco");
                self.start_sco(core);
                Some(ScoEvent::HeadsetConnected)
            }
            HeadsetEvent::HeadsetDisconnected { device_id } => {
                info!(%device_id, "headset disconnected");
                self.cancel_retry(core);
                self.platform.set_mode(AudioMode::Normal);
                self.set_state(ControllerState::WaitHeadset);
                Some(ScoEvent::HeadsetDisconnected)
            }
            HeadsetEvent::ScoRetry => {
                info!("restarting sco bring-up");
                self.start_sco(core);
                None
            }
            HeadsetEvent::ScoConnected => {
                self.cancel_retry(core);
                self.platform.set_bluetooth_sco_on(true);
                self.set_state(ControllerState::Up);
                info!("sco connected");
                Some(ScoEvent::ScoAudioConnected)
            }
            HeadsetEvent::ScoDisconnected => {
                if self.state() == ControllerState::BringingUp {
                    debug!("sco disconnected during bring-up");
                    return None;
                }
                info!("sco disconnected");
                self.set_state(ControllerState::WaitHeadset);
                Some(ScoEvent::ScoAudioDisconnected)
            }
            other => {
                debug!(event = other.name(), "headset event");
                None
            }
        }
    }
}

impl Drop for ControllerInner {
    fn drop(&mut self) {
        if let Some(retry) = self.core.get_mut().retry.take() {
            retry.cancel();
        }
    }
}

async fn event_loop(
    controller: Weak<ControllerInner>,
    mut events: mpsc::UnboundedReceiver<HeadsetEvent>,
    session: u64,
) {
    debug!(session, "controller event loop started");
    while let Some(event) = events.recv().await {
        let Some(controller) = controller.upgrade() else {
            break;
        };
        controller.handle_event(event, session).await;
    }
    debug!(session, "controller event loop finished");
}

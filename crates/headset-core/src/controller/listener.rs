//! SCO listener surface and fan-out

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Notification delivered to [`ScoListener`]s
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScoEvent {
    HeadsetConnected,
    HeadsetDisconnected,
    ScoAudioConnected,
    ScoAudioDisconnected,
}

/// Observer of headset and SCO link changes.
///
/// Override the per-event hooks, or [`on_sco_event`](Self::on_sco_event)
/// to handle every event in one place. A panicking listener is logged and
/// does not keep later listeners from being called.
#[async_trait]
pub trait ScoListener: Send + Sync {
    async fn on_headset_connected(&self) {}

    async fn on_headset_disconnected(&self) {}

    async fn on_sco_audio_connected(&self) {}

    async fn on_sco_audio_disconnected(&self) {}

    async fn on_sco_event(&self, event: ScoEvent) {
        match event {
            ScoEvent::HeadsetConnected => self.on_headset_connected().await,
            ScoEvent::HeadsetDisconnected => self.on_headset_disconnected().await,
            ScoEvent::ScoAudioConnected => self.on_sco_audio_connected().await,
            ScoEvent::ScoAudioDisconnected => self.on_sco_audio_disconnected().await,
        }
    }
}

fn same_listener(a: &Arc<dyn ScoListener>, b: &Arc<dyn ScoListener>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Listeners in insertion order, each registered at most once
#[derive(Default)]
pub(crate) struct ListenerSet {
    listeners: RwLock<Vec<Arc<dyn ScoListener>>>,
}

impl ListenerSet {
    /// Returns false if the listener was already registered
    pub(crate) fn add(&self, listener: Arc<dyn ScoListener>) -> bool {
        let mut listeners = self.listeners.write();
        if listeners.iter().any(|existing| same_listener(existing, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Returns false if the listener was not registered
    pub(crate) fn remove(&self, listener: &Arc<dyn ScoListener>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|existing| !same_listener(existing, listener));
        listeners.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Deliver `event` to a snapshot of the listeners, in order
    pub(crate) async fn notify(&self, event: ScoEvent) {
        let snapshot: Vec<_> = self.listeners.read().clone();
        debug!(?event, listeners = snapshot.len(), "notifying sco listeners");

        for (index, listener) in snapshot.iter().enumerate() {
            let outcome = AssertUnwindSafe(listener.on_sco_event(event))
                .catch_unwind()
                .await;
            if outcome.is_err() {
                error!(?event, index, "sco listener panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ScoListener for Recorder {
        async fn on_sco_audio_connected(&self) {
            self.log.lock().push(format!("{}:connected", self.name));
        }
    }

    struct Panicker;

    #[async_trait]
    impl ScoListener for Panicker {
        async fn on_sco_event(&self, _event: ScoEvent) {
            panic!("listener failure");
        }
    }

    #[tokio::test]
    async fn test_insertion_order_and_panic_isolation() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let set = ListenerSet::default();
        set.add(Arc::new(Recorder { name: "a", log: log.clone() }));
        set.add(Arc::new(Panicker));
        set.add(Arc::new(Recorder { name: "b", log: log.clone() }));

        set.notify(ScoEvent::ScoAudioConnected).await;
        set.notify(ScoEvent::HeadsetConnected).await;
        assert_eq!(*log.lock(), vec!["a:connected", "b:connected"]);
    }

    #[test]
    fn test_same_listener_is_added_once() {
        let set = ListenerSet::default();
        let listener: Arc<dyn ScoListener> = Arc::new(Panicker);
        assert!(set.add(listener.clone()));
        assert!(!set.add(listener.clone()));
        assert_eq!(set.len(), 1);
        assert!(set.remove(&listener));
        assert!(!set.remove(&listener));
        assert_eq!(set.len(), 0);
    }
}

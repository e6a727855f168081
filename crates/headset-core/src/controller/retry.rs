//! Bring-up retry timer
//!
//! Ticks once immediately and then every period until the horizon has
//! elapsed, asking the platform to start SCO on each tick. At the horizon
//! the controller gives up. A timer is identified by a generation number;
//! the controller only honours ticks from the generation it armed last, so
//! a timer cancelled while one of its ticks waits for the controller lock
//! cannot act.

use std::sync::Weak;

use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tracing::trace;

use super::ControllerInner;
use crate::config::ScoConfig;

pub(crate) struct RetryTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

impl RetryTimer {
    pub(crate) fn arm(controller: Weak<ControllerInner>, generation: u64, config: &ScoConfig) -> Self {
        let handle = tokio::spawn(run(
            controller,
            generation,
            config.retry_period(),
            config.retry_horizon(),
            config.ticks_per_horizon(),
        ));
        Self { generation, handle }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn cancel(self) {
        self.handle.abort();
    }
}

async fn run(
    controller: Weak<ControllerInner>,
    generation: u64,
    period: Duration,
    horizon: Duration,
    ticks: u64,
) {
    let deadline = Instant::now() + horizon;
    let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    for tick in 1..=ticks {
        interval.tick().await;
        let Some(controller) = controller.upgrade() else {
            return;
        };
        if !controller.on_retry_tick(generation, tick).await {
            trace!(generation, "retry timer superseded");
            return;
        }
    }

    tokio::time::sleep_until(deadline).await;
    if let Some(controller) = controller.upgrade() {
        controller.on_retry_expired(generation).await;
    }
}

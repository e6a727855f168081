//! Single-slot rendezvous between the capture side and the playback side
//!
//! A producer offering a value waits a bounded time for a consumer to take
//! it; if none does, the offer fails and the value is dropped. Nothing is
//! ever buffered beyond the one hand-off in progress, so a slow consumer
//! turns into dropped frames rather than unbounded memory growth.
//!
//! Hand-off is exact: an offer reports success if and only if a consumer
//! received the value.

use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::time::{Duration, Instant, timeout_at};
use tracing::trace;

use crate::error::{AudioError, AudioResult};

struct Handoff<T> {
    item: T,
    ack: oneshot::Sender<()>,
}

/// Capacity-one hand-off slot
pub struct Rendezvous<T> {
    tx: mpsc::Sender<Handoff<T>>,
    rx: Mutex<mpsc::Receiver<Handoff<T>>>,
}

impl<T: Send> Rendezvous<T> {
    /// Create an empty slot
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Offer `item`, waiting at most `timeout` for a consumer to take it.
    ///
    /// Returns [`AudioError::Timeout`] when no consumer took the value in
    /// time; the value is dropped in that case.
    pub async fn offer(&self, item: T, timeout: Duration) -> AudioResult<()> {
        let deadline = Instant::now() + timeout;
        let (ack_tx, mut ack_rx) = oneshot::channel();

        match timeout_at(deadline, self.tx.send(Handoff { item, ack: ack_tx })).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => return Err(AudioError::Closed),
            Err(_) => return Err(AudioError::timeout("rendezvous offer", timeout.as_millis() as u64)),
        }

        match timeout_at(deadline, &mut ack_rx).await {
            Ok(Ok(())) => Ok(()),
            // Consumer dropped the hand-off without taking it
            Ok(Err(_)) => Err(AudioError::Closed),
            Err(_) => {
                // Close first so a racing consumer cannot take the value
                // after we decide it was dropped.
                ack_rx.close();
                if ack_rx.try_recv().is_ok() {
                    Ok(())
                } else {
                    trace!("rendezvous offer expired after {:?}", timeout);
                    Err(AudioError::timeout("rendezvous offer", timeout.as_millis() as u64))
                }
            }
        }
    }

    /// Wait at most `timeout` for a producer's value.
    ///
    /// Returns `None` when the wait expires. Values whose producer already
    /// gave up are discarded while waiting.
    pub async fn poll(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut rx = self.rx.lock().await;
        loop {
            match timeout_at(deadline, rx.recv()).await {
                Ok(Some(handoff)) => {
                    if handoff.ack.send(()).is_ok() {
                        return Some(handoff.item);
                    }
                    trace!("discarding abandoned rendezvous offer");
                }
                Ok(None) | Err(_) => return None,
            }
        }
    }
}

impl<T: Send> Default for Rendezvous<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Rendezvous<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rendezvous")
            .field("pending", &(self.tx.capacity() == 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_offer_without_consumer_times_out() {
        let slot = Rendezvous::new();
        let started = Instant::now();
        let result = slot.offer(1u32, Duration::from_millis(100)).await;
        assert!(result.unwrap_err().is_timeout());
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(100) && waited < Duration::from_millis(110));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_without_producer_times_out() {
        let slot: Rendezvous<u32> = Rendezvous::new();
        let started = Instant::now();
        assert_eq!(slot.poll(Duration::from_millis(300)).await, None);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(300) && waited < Duration::from_millis(310));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_offer_is_not_delivered() {
        let slot = Arc::new(Rendezvous::new());
        assert!(slot.offer(1u32, Duration::from_millis(100)).await.is_err());

        let producer = {
            let slot = slot.clone();
            tokio::spawn(async move { slot.offer(2u32, Duration::from_millis(100)).await })
        };
        assert_eq!(slot.poll(Duration::from_millis(300)).await, Some(2));
        assert!(producer.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_consumer_receives_offer() {
        let slot = Arc::new(Rendezvous::new());
        let consumer = {
            let slot = slot.clone();
            tokio::spawn(async move { slot.poll(Duration::from_millis(300)).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        slot.offer("frame", Duration::from_millis(100)).await.unwrap();
        assert_eq!(consumer.await.unwrap(), Some("frame"));
    }
}

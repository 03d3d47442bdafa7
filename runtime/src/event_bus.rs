//! In-process event bus over a tokio broadcast channel.

use hotel_ops_core::event_bus::{EventBus, EventBusError, EventStream};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// Broadcast-backed [`EventBus`].
///
/// Every subscriber sees every event published after it subscribed, in
/// publish order. A subscriber more than `capacity` events behind skips the
/// oldest ones (and a warning is logged).
#[derive(Debug, Clone)]
pub struct BroadcastEventBus<E> {
    sender: broadcast::Sender<E>,
}

impl<E: Clone + Send + 'static> BroadcastEventBus<E> {
    /// Create a bus buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<E: Clone + Send + 'static> Default for BroadcastEventBus<E> {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl<E: Clone + Send + 'static> EventBus<E> for BroadcastEventBus<E> {
    fn publish(&self, event: E) -> Result<usize, EventBusError> {
        // A send error only means nobody is listening.
        Ok(self.sender.send(event).unwrap_or(0))
    }

    fn subscribe(&self) -> EventStream<E> {
        let receiver = self.sender.subscribe();
        Box::pin(futures::stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => return Some((event, receiver)),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Event subscriber lagged, events skipped");
                    },
                    Err(RecvError::Closed) => return None,
                }
            }
        }))
    }
}

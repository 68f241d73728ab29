//! Event system for notifying the host.
//!
//! Link transitions and state changes caused by controller reports are
//! broadcast so the host can refresh whatever it shows to the user.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::device::DeviceUpdate;
use crate::protocol::OutputId;

/// Event types that can be dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Link opened.
    Connected,
    /// Link lost.
    Disconnected,
    /// A device changed because the controller reported a new level.
    DeviceUpdated {
        /// Output the report was for.
        id: OutputId,
        /// What changed.
        update: DeviceUpdate,
    },
}

/// A subscription to events.
pub struct Subscription {
    receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Receives the next event.
    ///
    /// Returns `None` once the dispatcher is gone. Events missed because the
    /// subscriber lagged are skipped.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!("subscriber lagged, skipped {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns an already-dispatched event without waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => return None,
            }
        }
    }

    /// Waits for an event matching `predicate`.
    ///
    /// Only events dispatched after the subscription was created are seen,
    /// so subscribe before sending whatever triggers the event. Returns
    /// `None` if the timeout expires or the dispatcher is gone.
    pub async fn wait_for<F>(&mut self, predicate: F, timeout: Duration) -> Option<Event>
    where
        F: Fn(&Event) -> bool,
    {
        let matching = async {
            while let Some(event) = self.recv().await {
                if predicate(&event) {
                    return Some(event);
                }
            }
            None
        };
        tokio::time::timeout(timeout, matching).await.ok().flatten()
    }
}

struct EventDispatcherInner {
    sender: broadcast::Sender<Event>,
}

/// Dispatches events to subscribers.
#[derive(Clone)]
pub struct EventDispatcher {
    inner: Arc<EventDispatcherInner>,
}

impl EventDispatcher {
    /// Creates a new event dispatcher.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(EventDispatcherInner { sender }),
        }
    }

    /// Dispatches an event to all subscribers.
    pub fn dispatch(&self, event: Event) {
        // No subscribers is fine
        let _ = self.inner.sender.send(event);
    }

    /// Subscribes to events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.inner.sender.subscribe(),
        }
    }
}

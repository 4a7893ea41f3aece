//! Notification fan-out from the manager to any number of subscribers.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::tunnel::types::{TunnelId, TunnelStatus};

/// A change published by the manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TunnelEvent {
    /// A tunnel was registered
    Added { id: TunnelId, name: String },

    /// A tunnel was removed
    Removed { id: TunnelId, name: String },

    /// A tunnel changed status. `failure` carries the engine's reason when
    /// the change is the result of a failed operation.
    StatusChanged {
        id: TunnelId,
        name: String,
        old: TunnelStatus,
        new: TunnelStatus,
        failure: Option<String>,
    },

    /// A tunnel's configuration or on-demand policy was replaced
    ConfigChanged { id: TunnelId, name: String },
}

impl TunnelEvent {
    pub fn tunnel_id(&self) -> TunnelId {
        match self {
            TunnelEvent::Added { id, .. }
            | TunnelEvent::Removed { id, .. }
            | TunnelEvent::StatusChanged { id, .. }
            | TunnelEvent::ConfigChanged { id, .. } => *id,
        }
    }

    pub fn tunnel_name(&self) -> &str {
        match self {
            TunnelEvent::Added { name, .. }
            | TunnelEvent::Removed { name, .. }
            | TunnelEvent::StatusChanged { name, .. }
            | TunnelEvent::ConfigChanged { name, .. } => name,
        }
    }
}

/// Identifies one subscriber for [`EventHub::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Receiving end of a subscription.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    rx: mpsc::UnboundedReceiver<TunnelEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next event. Returns `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<TunnelEvent> {
        self.rx.recv().await
    }

    /// Take the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<TunnelEvent> {
        self.rx.try_recv().ok()
    }

    /// Take every queued event.
    pub fn drain(&mut self) -> Vec<TunnelEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Single-writer, multi-reader event fan-out.
///
/// Each subscriber has its own unbounded queue, so a slow reader never causes
/// another reader to miss or reorder events.
#[derive(Debug, Default)]
pub struct EventHub {
    subscribers: Mutex<Vec<(SubscriptionId, mpsc::UnboundedSender<TunnelEvent>)>>,
    next_id: AtomicU64,
}

impl EventHub {
    pub fn new() -> Self {
        EventHub::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push((id, tx));
        debug!(subscription = id.0, "Subscriber added");
        Subscription { id, rx }
    }

    /// Remove a subscriber. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        before != subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Deliver an event to every live subscriber, pruning closed ones.
    pub(crate) fn publish(&self, event: TunnelEvent) {
        let mut subscribers = self.lock();
        subscribers.retain(|(id, tx)| {
            let delivered = tx.send(event.clone()).is_ok();
            if !delivered {
                debug!(subscription = id.0, "Dropping closed subscriber");
            }
            delivered
        });
    }

    fn lock(
        &self,
    ) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, mpsc::UnboundedSender<TunnelEvent>)>> {
        // A poisoned list is still a valid list of senders
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

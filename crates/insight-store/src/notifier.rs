//! Per-owner change pulses
//!
//! Subscribers get a bounded slot; `publish` never blocks and never fails.
//! A full slot means the subscriber already has a pending pulse, so the new
//! one is dropped. Pulses carry no content: receivers re-read the feed.

use insight_core::{NotifierConfig, OwnerId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tracing::{debug, trace};

#[derive(Debug)]
struct Slot {
    id: u64,
    tx: mpsc::Sender<()>,
}

#[derive(Debug)]
struct Registry {
    subscribers: Mutex<HashMap<OwnerId, Vec<Slot>>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl Registry {
    fn remove(&self, owner: &OwnerId, id: u64) {
        let mut subscribers = self.subscribers.lock();
        if let Some(slots) = subscribers.get_mut(owner) {
            slots.retain(|slot| slot.id != id);
            if slots.is_empty() {
                subscribers.remove(owner);
            }
        }
    }
}

/// Fan-out of "your feed changed" pulses
#[derive(Debug, Clone)]
pub struct FeedNotifier {
    registry: Arc<Registry>,
}

impl FeedNotifier {
    /// `capacity` pending pulses per subscriber, at least one
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            registry: Arc::new(Registry {
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                capacity: capacity.max(1),
            }),
        }
    }

    #[must_use]
    pub fn from_config(config: &NotifierConfig) -> Self {
        Self::new(config.slot_capacity)
    }

    /// Register a live viewer of `owner`'s feed
    #[must_use]
    pub fn subscribe(&self, owner: &OwnerId) -> Subscription {
        let (tx, rx) = mpsc::channel(self.registry.capacity);
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry
            .subscribers
            .lock()
            .entry(owner.clone())
            .or_default()
            .push(Slot { id, tx });
        debug!(%owner, subscription = id, "subscribed");

        Subscription {
            id,
            owner: owner.clone(),
            rx,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Pulse every subscriber of `owner`; returns how many received one
    pub fn publish(&self, owner: &OwnerId) -> usize {
        let mut subscribers = self.registry.subscribers.lock();
        let Some(slots) = subscribers.get_mut(owner) else {
            return 0;
        };

        let mut delivered = 0;
        slots.retain(|slot| match slot.tx.try_send(()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(())) => {
                trace!(%owner, subscription = slot.id, "pulse coalesced");
                true
            }
            Err(TrySendError::Closed(())) => false,
        });
        if slots.is_empty() {
            subscribers.remove(owner);
        }
        delivered
    }

    #[must_use]
    pub fn subscriber_count(&self, owner: &OwnerId) -> usize {
        self.registry
            .subscribers
            .lock()
            .get(owner)
            .map_or(0, Vec::len)
    }
}

impl Default for FeedNotifier {
    fn default() -> Self {
        Self::new(NotifierConfig::default().slot_capacity)
    }
}

/// Receiving end held by one viewer; unsubscribes on drop
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    owner: OwnerId,
    rx: mpsc::Receiver<()>,
    registry: Weak<Registry>,
}

impl Subscription {
    #[inline]
    #[must_use]
    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    /// Wait for the next pulse; `false` once the notifier is gone
    pub async fn changed(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }

    /// Consume a pending pulse without waiting
    pub fn try_changed(&mut self) -> bool {
        match self.rx.try_recv() {
            Ok(()) => true,
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => false,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.owner, self.id);
            debug!(owner = %self.owner, subscription = self.id, "unsubscribed");
        }
    }
}

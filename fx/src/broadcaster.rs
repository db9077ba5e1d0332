//! Fan-out of rate snapshots to independently paced subscribers.
//!
//! Every subscriber owns a queue of capacity one. A publish that finds a
//! queue still full evicts that subscriber and closes its queue instead of
//! waiting, so a slow consumer never stalls the rate store. Consumers see
//! closure as the end of their subscription and resubscribe.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::error::{FxError, FxResult};
use crate::table::RateSnapshot;

/// Identifier of a registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[derive(Default)]
struct Registry {
    subscribers: HashMap<SubscriberId, mpsc::Sender<Arc<RateSnapshot>>>,
    next_id: u64,
    closed: bool,
    published: u64,
    evicted: u64,
}

/// Result of a single publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Subscribers that accepted the snapshot.
    pub delivered: usize,
    /// Subscribers evicted because their queue was still full.
    pub evicted: usize,
}

/// Broadcaster statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    pub active_subscribers: usize,
    pub snapshots_published: u64,
    pub subscribers_evicted: u64,
}

/// Owns the subscriber registry.
///
/// The registry has its own lock, separate from the rate table's, so
/// subscriber churn never delays rate reads or ticks.
#[derive(Clone, Default)]
pub struct RateBroadcaster {
    registry: Arc<Mutex<Registry>>,
}

impl RateBroadcaster {
    /// Create a broadcaster with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber with a capacity-one queue.
    pub fn subscribe(&self) -> FxResult<RateSubscription> {
        let mut registry = self.registry.lock();
        if registry.closed {
            return Err(FxError::BroadcasterClosed);
        }

        registry.next_id += 1;
        let id = SubscriberId(registry.next_id);
        let (tx, rx) = mpsc::channel(1);
        registry.subscribers.insert(id, tx);

        debug!(subscriber = %id, active = registry.subscribers.len(), "Subscriber registered");

        Ok(RateSubscription {
            id,
            receiver: rx,
            registry: Arc::downgrade(&self.registry),
        })
    }

    /// Remove a subscriber. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.registry.lock().subscribers.remove(&id).is_some();
        if removed {
            debug!(subscriber = %id, "Subscriber removed");
        }
        removed
    }

    /// Offer a snapshot to every subscriber without blocking.
    pub fn publish(&self, snapshot: Arc<RateSnapshot>) -> FxResult<PublishOutcome> {
        let mut registry = self.registry.lock();
        if registry.closed {
            return Err(FxError::BroadcasterClosed);
        }

        let mut outcome = PublishOutcome::default();
        registry.subscribers.retain(|id, tx| match tx.try_send(snapshot.clone()) {
            Ok(()) => {
                outcome.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!(subscriber = %id, "Subscriber too slow, evicting");
                outcome.evicted += 1;
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(subscriber = %id, "Subscriber gone, pruning");
                false
            }
        });

        registry.published += 1;
        registry.evicted += outcome.evicted as u64;

        debug!(
            delivered = outcome.delivered,
            evicted = outcome.evicted,
            "Snapshot published"
        );

        Ok(outcome)
    }

    /// Close every subscriber queue. Only the first call closes anything;
    /// it returns the number of queues closed.
    pub fn shutdown(&self) -> usize {
        let mut registry = self.registry.lock();
        if registry.closed {
            return 0;
        }
        registry.closed = true;

        let closed = registry.subscribers.len();
        registry.subscribers.clear();

        info!(closed, "Rate broadcaster shut down");
        closed
    }

    /// Check if the broadcaster has been shut down.
    pub fn is_shut_down(&self) -> bool {
        self.registry.lock().closed
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().subscribers.len()
    }

    pub fn stats(&self) -> BroadcastStats {
        let registry = self.registry.lock();
        BroadcastStats {
            active_subscribers: registry.subscribers.len(),
            snapshots_published: registry.published,
            subscribers_evicted: registry.evicted,
        }
    }
}

/// Receiving end of a subscription.
///
/// Dropping it unregisters the subscriber.
pub struct RateSubscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<Arc<RateSnapshot>>,
    registry: Weak<Mutex<Registry>>,
}

impl RateSubscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next snapshot. `None` means the queue was closed by
    /// eviction or shutdown.
    pub async fn recv(&mut self) -> Option<Arc<RateSnapshot>> {
        self.receiver.recv().await
    }

    /// Take a pending snapshot without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<RateSnapshot>> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for RateSubscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().subscribers.remove(&self.id);
        }
    }
}

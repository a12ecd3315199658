use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use livepoll_types::events::PollFrame;

/// Sender half of an observer's connection channel. The receiving end is
/// owned by that observer's connection task.
pub type ObserverSender = mpsc::UnboundedSender<PollFrame>;

/// Tracks which observers are watching which poll.
///
/// Cheap to clone; all clones share the same state. Owned by the server
/// process and injected into request handlers — there is no global.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    /// Every connected observer, subscribed to a poll or not, so teardown
    /// works even for a connection that never subscribed.
    connected: RwLock<HashMap<Uuid, ObserverSender>>,

    /// poll id -> ids of observers watching it.
    subscribers: RwLock<HashMap<Uuid, HashSet<Uuid>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                connected: RwLock::new(HashMap::new()),
                subscribers: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Register a freshly connected observer. Returns its id and the
    /// receiving end of its frame channel.
    pub async fn register(&self) -> (Uuid, mpsc::UnboundedReceiver<PollFrame>) {
        let observer_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.connected.write().await.insert(observer_id, tx);
        (observer_id, rx)
    }

    /// Add the observer to the poll's set. Re-subscribing is a no-op.
    pub async fn subscribe(&self, poll_id: Uuid, observer_id: Uuid) {
        self.inner
            .subscribers
            .write()
            .await
            .entry(poll_id)
            .or_default()
            .insert(observer_id);
    }

    /// Remove the observer from every poll's set and the connected set.
    /// Safe to call repeatedly and for ids that were never registered.
    pub async fn unsubscribe_all(&self, observer_id: Uuid) {
        self.inner.connected.write().await.remove(&observer_id);

        let mut subscribers = self.inner.subscribers.write().await;
        subscribers.retain(|_, observers| {
            observers.remove(&observer_id);
            !observers.is_empty()
        });
    }

    /// Owned copy of the current observer set for a poll. Mutations after
    /// this call do not affect the returned set, so callers can iterate it
    /// without holding any lock.
    pub async fn observers_for(&self, poll_id: Uuid) -> Vec<(Uuid, ObserverSender)> {
        let subscribers = self.inner.subscribers.read().await;
        let Some(ids) = subscribers.get(&poll_id) else {
            return Vec::new();
        };

        let connected = self.inner.connected.read().await;
        ids.iter()
            .filter_map(|id| connected.get(id).map(|tx| (*id, tx.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribe_is_idempotent() {
        let registry = SubscriptionRegistry::new();
        let poll_id = Uuid::new_v4();
        let (observer_id, _rx) = registry.register().await;

        registry.subscribe(poll_id, observer_id).await;
        registry.subscribe(poll_id, observer_id).await;

        assert_eq!(registry.observers_for(poll_id).await.len(), 1);
    }

    #[tokio::test]
    async fn unsubscribe_all_clears_every_poll() {
        let registry = SubscriptionRegistry::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let (observer_id, _rx) = registry.register().await;

        registry.subscribe(first, observer_id).await;
        registry.subscribe(second, observer_id).await;

        registry.unsubscribe_all(observer_id).await;
        assert!(registry.observers_for(first).await.is_empty());
        assert!(registry.observers_for(second).await.is_empty());

        // Repeated teardown is a no-op
        registry.unsubscribe_all(observer_id).await;
    }

    #[tokio::test]
    async fn fresh_observer_does_not_resurrect_stale_one() {
        let registry = SubscriptionRegistry::new();
        let poll_id = Uuid::new_v4();

        let (stale, _stale_rx) = registry.register().await;
        registry.subscribe(poll_id, stale).await;
        registry.unsubscribe_all(stale).await;

        let (fresh, _fresh_rx) = registry.register().await;
        registry.subscribe(poll_id, fresh).await;

        let observers = registry.observers_for(poll_id).await;
        assert_eq!(observers.len(), 1);
        assert_eq!(observers[0].0, fresh);
    }

    #[tokio::test]
    async fn observers_for_returns_a_copy() {
        let registry = SubscriptionRegistry::new();
        let poll_id = Uuid::new_v4();
        let (observer_id, _rx) = registry.register().await;
        registry.subscribe(poll_id, observer_id).await;

        let before = registry.observers_for(poll_id).await;
        registry.unsubscribe_all(observer_id).await;

        // The copy taken earlier is unaffected by the teardown
        assert_eq!(before.len(), 1);
        assert!(registry.observers_for(poll_id).await.is_empty());
    }
}

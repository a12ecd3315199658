use tracing::{debug, warn};
use uuid::Uuid;

use livepoll_types::events::PollFrame;
use livepoll_types::models::PollSnapshot;

use crate::registry::SubscriptionRegistry;

/// Outcome of one broadcast pass. Observers whose delivery failed have
/// already been pruned from the registry by the time this is returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub dropped: usize,
}

/// Pushes poll snapshots to every observer subscribed to a poll.
#[derive(Clone)]
pub struct UpdateBroadcaster {
    registry: SubscriptionRegistry,
}

impl UpdateBroadcaster {
    pub fn new(registry: SubscriptionRegistry) -> Self {
        Self { registry }
    }

    /// Deliver `snapshot` to every observer currently subscribed to
    /// `poll_id`. Each delivery is attempted independently: a dead observer
    /// is torn down and counted, and never stops delivery to the rest. An
    /// empty observer set is a no-op.
    pub async fn broadcast(&self, poll_id: Uuid, snapshot: PollSnapshot) -> DeliveryReport {
        let observers = self.registry.observers_for(poll_id).await;
        if observers.is_empty() {
            return DeliveryReport::default();
        }

        let mut report = DeliveryReport::default();
        for (observer_id, tx) in observers {
            let frame = PollFrame::PollUpdate {
                poll: snapshot.clone(),
            };
            if tx.send(frame).is_ok() {
                report.delivered += 1;
            } else {
                // The receiving connection task is gone; its observer just
                // hadn't been torn down yet.
                warn!(
                    "observer {} unreachable, dropping its subscriptions",
                    observer_id
                );
                self.registry.unsubscribe_all(observer_id).await;
                report.dropped += 1;
            }
        }

        debug!(
            "poll {} update: {} delivered, {} dropped",
            poll_id, report.delivered, report.dropped
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use livepoll_types::models::OptionTally;

    use super::*;

    fn snapshot(poll_id: Uuid, count: u64) -> PollSnapshot {
        PollSnapshot {
            id: poll_id,
            question: "Tabs or spaces?".into(),
            is_published: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            creator_id: Uuid::new_v4(),
            options: vec![OptionTally {
                id: Uuid::new_v4(),
                text: "Tabs".into(),
                vote_count: count,
            }],
        }
    }

    #[tokio::test]
    async fn every_subscribed_observer_gets_exactly_one_frame() {
        let registry = SubscriptionRegistry::new();
        let broadcaster = UpdateBroadcaster::new(registry.clone());
        let poll_id = Uuid::new_v4();

        let mut receivers = Vec::new();
        for _ in 0..3 {
            let (observer_id, rx) = registry.register().await;
            registry.subscribe(poll_id, observer_id).await;
            receivers.push(rx);
        }

        let report = broadcaster.broadcast(poll_id, snapshot(poll_id, 7)).await;
        assert_eq!(report, DeliveryReport {
            delivered: 3,
            dropped: 0,
        });

        for rx in &mut receivers {
            match rx.try_recv().unwrap() {
                PollFrame::PollUpdate { poll } => {
                    assert_eq!(poll.id, poll_id);
                    assert_eq!(poll.options[0].vote_count, 7);
                }
                other => panic!("unexpected frame: {other:?}"),
            }
            // Exactly one frame per broadcast
            assert!(rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn dead_observer_is_pruned_without_stopping_delivery() {
        let registry = SubscriptionRegistry::new();
        let broadcaster = UpdateBroadcaster::new(registry.clone());
        let poll_id = Uuid::new_v4();

        let (live_id, mut live_rx) = registry.register().await;
        registry.subscribe(poll_id, live_id).await;

        let (dead_id, dead_rx) = registry.register().await;
        registry.subscribe(poll_id, dead_id).await;
        drop(dead_rx);

        let report = broadcaster.broadcast(poll_id, snapshot(poll_id, 1)).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.dropped, 1);
        assert!(live_rx.try_recv().is_ok());

        // Lazy cleanup removed the dead observer entirely
        let remaining = registry.observers_for(poll_id).await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].0, live_id);
    }

    #[tokio::test]
    async fn observers_of_other_polls_see_nothing() {
        let registry = SubscriptionRegistry::new();
        let broadcaster = UpdateBroadcaster::new(registry.clone());
        let watched = Uuid::new_v4();
        let other = Uuid::new_v4();

        let (observer_id, mut rx) = registry.register().await;
        registry.subscribe(watched, observer_id).await;

        let report = broadcaster.broadcast(other, snapshot(other, 2)).await;
        assert_eq!(report, DeliveryReport::default());
        assert!(rx.try_recv().is_err());
    }
}

//! Fire-and-forget market events.
//!
//! A broadcast channel the presentation layer can subscribe to. Delivery is
//! best-effort: no subscribers, or a lagging subscriber, never affects the
//! operation that emitted the event.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::core_types::{Amount, LeagueId, OrderId, TeamId};

#[derive(Debug, Clone, Serialize)]
pub enum MarketEvent {
    /// A settlement sweep started for a league.
    CycleStarted { league_id: LeagueId },
    BidPlaced {
        order_id: OrderId,
        bidder_team_id: TeamId,
        amount: Amount,
    },
    /// Order expired or was cancelled without an award.
    OrderClosed { order_id: OrderId },
    OrderAwarded {
        order_id: OrderId,
        winner_team_id: TeamId,
        amount: Amount,
    },
}

#[derive(Clone)]
pub struct MarketNotifier {
    tx: broadcast::Sender<MarketEvent>,
}

impl MarketNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MarketEvent> {
        self.tx.subscribe()
    }

    /// Send ignoring the no-receivers error.
    pub fn publish(&self, event: MarketEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for MarketNotifier {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_subscribers_is_silent() {
        let notifier = MarketNotifier::default();
        notifier.publish(MarketEvent::OrderClosed { order_id: 7 });
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let notifier = MarketNotifier::default();
        let mut rx = notifier.subscribe();
        notifier.publish(MarketEvent::BidPlaced {
            order_id: 1,
            bidder_team_id: 2,
            amount: 1_500_000,
        });
        match rx.recv().await.unwrap() {
            MarketEvent::BidPlaced {
                order_id, amount, ..
            } => {
                assert_eq!(order_id, 1);
                assert_eq!(amount, 1_500_000);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}

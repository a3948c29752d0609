use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::models::{MarketId, OrderBook};

use super::subscriber::OrderBookSubscriber;

/// Handle returned by `subscribe`, used to unsubscribe
pub type SubscriptionId = u64;

type Subscribers = Vec<(SubscriptionId, Arc<dyn OrderBookSubscriber>)>;

/// Per-market registry of order-book subscribers
///
/// Callbacks run on the publishing thread, after the registry guard has been
/// released, so a subscriber may subscribe or unsubscribe from inside a callback.
#[derive(Default)]
pub struct OrderBookFeed {
    subscribers: DashMap<MarketId, Subscribers>,
    next_id: AtomicU64,
}

impl OrderBookFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to updates for one market
    pub fn subscribe(
        &self,
        market_id: &str,
        subscriber: Arc<dyn OrderBookSubscriber>,
    ) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.subscribers
            .entry(market_id.to_string())
            .or_default()
            .push((id, subscriber));

        tracing::info!("📡 Subscriber {} registered for market {}", id, market_id);
        id
    }

    /// Remove a subscription; returns false if it was not registered
    pub fn unsubscribe(&self, market_id: &str, id: SubscriptionId) -> bool {
        let removed = match self.subscribers.get_mut(market_id) {
            Some(mut subs) => {
                let before = subs.len();
                subs.retain(|(sub_id, _)| *sub_id != id);
                subs.len() != before
            }
            None => false,
        };
        self.subscribers.remove_if(market_id, |_, subs| subs.is_empty());

        if removed {
            tracing::info!("📡 Subscriber {} unregistered from market {}", id, market_id);
        } else {
            tracing::warn!("📡 Attempted to unregister unknown subscriber {} ({})", id, market_id);
        }
        removed
    }

    /// Push a snapshot to every subscriber of its market
    pub fn publish(&self, book: &OrderBook) -> usize {
        let targets = self.targets(&book.market_id);
        for subscriber in &targets {
            subscriber.on_order_book_updated(book);
        }
        targets.len()
    }

    pub fn notify_connection_error(&self, message: &str) {
        for subscriber in self.all_targets() {
            subscriber.on_connection_error(message);
        }
    }

    pub fn notify_connection_restored(&self) {
        for subscriber in self.all_targets() {
            subscriber.on_connection_restored();
        }
    }

    pub fn subscriber_count(&self, market_id: &str) -> usize {
        self.subscribers
            .get(market_id)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }

    /// Markets with at least one subscriber
    pub fn markets(&self) -> Vec<MarketId> {
        self.subscribers.iter().map(|e| e.key().clone()).collect()
    }

    fn targets(&self, market_id: &str) -> Vec<Arc<dyn OrderBookSubscriber>> {
        self.subscribers
            .get(market_id)
            .map(|subs| subs.iter().map(|(_, s)| Arc::clone(s)).collect())
            .unwrap_or_default()
    }

    fn all_targets(&self) -> Vec<Arc<dyn OrderBookSubscriber>> {
        self.subscribers
            .iter()
            .flat_map(|e| e.value().iter().map(|(_, s)| Arc::clone(s)).collect::<Vec<_>>())
            .collect()
    }
}

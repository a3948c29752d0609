use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::engine::MatchingEngine;
use crate::models::{MarketId, OrderBook};
use crate::repositories::RepositoryError;

use super::feed::OrderBookFeed;

/// Where the poller reads order books from
#[async_trait]
pub trait OrderBookSource: Send + Sync {
    async fn fetch_order_book(&self, market_id: &str) -> Result<OrderBook, RepositoryError>;
}

#[async_trait]
impl OrderBookSource for MatchingEngine {
    async fn fetch_order_book(&self, market_id: &str) -> Result<OrderBook, RepositoryError> {
        Ok(self.snapshot(market_id))
    }
}

/// Periodically polls a source for every subscribed market and pushes changed
/// books to the feed.
///
/// # Example
/// ```ignore
/// let poller = Arc::new(OrderBookPoller::new(engine, feed, Duration::from_millis(500)));
/// poller.start();
/// // ...
/// poller.stop();
/// ```
pub struct OrderBookPoller {
    source: Arc<dyn OrderBookSource>,
    feed: Arc<OrderBookFeed>,
    interval: Duration,
    /// Last book published per market
    last_seen: Mutex<HashMap<MarketId, OrderBook>>,
    /// Set while the source is failing; cleared on the first success
    failing: AtomicBool,
    task_handle: Mutex<Option<JoinHandle<()>>>,
}

impl OrderBookPoller {
    pub fn new(
        source: Arc<dyn OrderBookSource>,
        feed: Arc<OrderBookFeed>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            feed,
            interval,
            last_seen: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
            task_handle: Mutex::new(None),
        }
    }

    /// Run one polling round; returns how many books were published
    pub async fn poll_once(&self) -> usize {
        let mut published = 0;

        for market_id in self.feed.markets() {
            match self.source.fetch_order_book(&market_id).await {
                Ok(book) => {
                    if self.failing.swap(false, Ordering::SeqCst) {
                        tracing::info!("order book source restored");
                        self.feed.notify_connection_restored();
                    }
                    if self.record_if_changed(&market_id, &book) {
                        self.feed.publish(&book);
                        published += 1;
                    }
                }
                Err(e) => {
                    if !self.failing.swap(true, Ordering::SeqCst) {
                        tracing::warn!(market = %market_id, "order book poll failed: {}", e);
                        self.feed.notify_connection_error(&e.to_string());
                    }
                }
            }
        }

        published
    }

    fn record_if_changed(&self, market_id: &str, book: &OrderBook) -> bool {
        let mut last_seen = self.last_seen.lock();
        match last_seen.get(market_id) {
            Some(previous) if previous.same_levels(book) => false,
            _ => {
                last_seen.insert(market_id.to_string(), book.clone());
                true
            }
        }
    }

    /// Spawn the polling loop on the current tokio runtime
    pub fn start(self: &Arc<Self>) {
        let mut handle = self.task_handle.lock();
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            tracing::warn!("order book poller already running");
            return;
        }

        let poller = Arc::clone(self);
        *handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poller.interval);
            tracing::info!("order book poller started ({:?})", poller.interval);
            loop {
                ticker.tick().await;
                poller.poll_once().await;
            }
        }));
    }

    pub fn stop(&self) {
        if let Some(handle) = self.task_handle.lock().take() {
            handle.abort();
            tracing::info!("order book poller stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task_handle
            .lock()
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::subscriber::{ChannelSubscriber, FeedEvent};
    use crate::models::{Order, OrderSide};
    use rust_decimal_macros::dec;

    /// Source that fails while `down` is set
    struct FlakySource {
        engine: MatchingEngine,
        down: AtomicBool,
    }

    #[async_trait]
    impl OrderBookSource for FlakySource {
        async fn fetch_order_book(&self, market_id: &str) -> Result<OrderBook, RepositoryError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(RepositoryError::Storage("connection refused".to_string()));
            }
            Ok(self.engine.snapshot(market_id))
        }
    }

    #[tokio::test]
    async fn test_publishes_only_changed_books() {
        let engine = Arc::new(MatchingEngine::new());
        let feed = Arc::new(OrderBookFeed::new());
        let (subscriber, mut rx) = ChannelSubscriber::new();
        feed.subscribe("m1", Arc::new(subscriber));

        let poller = OrderBookPoller::new(engine.clone(), feed, Duration::from_millis(10));
        assert_eq!(poller.poll_once().await, 1);
        assert_eq!(poller.poll_once().await, 0);

        engine
            .place_order(Order::limit("a", "m1", OrderSide::Buy, dec!(0.40), dec!(10)))
            .unwrap();
        assert_eq!(poller.poll_once().await, 1);

        assert!(matches!(rx.recv().await, Some(FeedEvent::Updated(b)) if b.is_empty()));
        match rx.recv().await {
            Some(FeedEvent::Updated(book)) => assert_eq!(book.best_bid(), Some(dec!(0.40))),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reports_error_once_then_restored() {
        let source = Arc::new(FlakySource {
            engine: MatchingEngine::new(),
            down: AtomicBool::new(true),
        });
        let feed = Arc::new(OrderBookFeed::new());
        let (subscriber, mut rx) = ChannelSubscriber::new();
        feed.subscribe("m1", Arc::new(subscriber));

        let poller = OrderBookPoller::new(source.clone(), feed, Duration::from_millis(10));
        poller.poll_once().await;
        poller.poll_once().await;
        source.down.store(false, Ordering::SeqCst);
        poller.poll_once().await;

        assert_eq!(
            rx.recv().await,
            Some(FeedEvent::ConnectionError("Storage error: connection refused".to_string()))
        );
        assert_eq!(rx.recv().await, Some(FeedEvent::ConnectionRestored));
        assert!(matches!(rx.recv().await, Some(FeedEvent::Updated(_))));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let engine = Arc::new(MatchingEngine::new());
        let feed = Arc::new(OrderBookFeed::new());
        let (subscriber, mut rx) = ChannelSubscriber::new();
        feed.subscribe("m1", Arc::new(subscriber));

        let poller = Arc::new(OrderBookPoller::new(engine, feed, Duration::from_millis(5)));
        poller.start();
        assert!(poller.is_running());

        let event = tokio::time::timeout(Duration::from_millis(500), rx.recv())
            .await
            .unwrap();
        assert!(matches!(event, Some(FeedEvent::Updated(_))));

        poller.stop();
        assert!(!poller.is_running());
    }
}

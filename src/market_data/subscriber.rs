use tokio::sync::mpsc;

use crate::models::OrderBook;

/// Consumer of order-book updates for the markets it subscribed to
pub trait OrderBookSubscriber: Send + Sync {
    fn on_order_book_updated(&self, book: &OrderBook);

    /// The book source failed; updates stop until it recovers
    fn on_connection_error(&self, _message: &str) {}

    fn on_connection_restored(&self) {}
}

/// Event forwarded by a `ChannelSubscriber`
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Updated(OrderBook),
    ConnectionError(String),
    ConnectionRestored,
}

/// Subscriber that forwards every callback into an unbounded channel
pub struct ChannelSubscriber {
    tx: mpsc::UnboundedSender<FeedEvent>,
}

impl ChannelSubscriber {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FeedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: FeedEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("feed receiver dropped, event discarded");
        }
    }
}

impl OrderBookSubscriber for ChannelSubscriber {
    fn on_order_book_updated(&self, book: &OrderBook) {
        self.forward(FeedEvent::Updated(book.clone()));
    }

    fn on_connection_error(&self, message: &str) {
        self.forward(FeedEvent::ConnectionError(message.to_string()));
    }

    fn on_connection_restored(&self) {
        self.forward(FeedEvent::ConnectionRestored);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_subscriber_forwards_events() {
        let (subscriber, mut rx) = ChannelSubscriber::new();
        let book = OrderBook::empty("m1");

        subscriber.on_order_book_updated(&book);
        subscriber.on_connection_error("source down");
        subscriber.on_connection_restored();

        assert_eq!(rx.recv().await, Some(FeedEvent::Updated(book)));
        assert_eq!(
            rx.recv().await,
            Some(FeedEvent::ConnectionError("source down".to_string()))
        );
        assert_eq!(rx.recv().await, Some(FeedEvent::ConnectionRestored));
    }
}

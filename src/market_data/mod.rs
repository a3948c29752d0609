/// Order-book distribution
///
/// `OrderBookFeed` fans snapshots out to per-market subscribers. Snapshots
/// arrive either pushed by the placement service after each order, or pulled
/// by `OrderBookPoller` from an `OrderBookSource` on an interval.
pub mod feed;
pub mod poller;
pub mod subscriber;

pub use feed::{OrderBookFeed, SubscriptionId};
pub use poller::{OrderBookPoller, OrderBookSource};
pub use subscriber::{ChannelSubscriber, FeedEvent, OrderBookSubscriber};

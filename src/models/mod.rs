pub mod order;
pub mod orderbook;
pub mod position;
pub mod settlement;
pub mod trade;

pub use order::{AccountId, MarketId, Order, OrderSide, OrderStatus, OrderType};
pub use orderbook::{level_price, OrderBook, PriceLevel};
pub use position::Position;
pub use settlement::{MarketStatus, SettlementRecord, SettlementSummary};
pub use trade::Trade;

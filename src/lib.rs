// Library Crate Root
// lib.rs

pub mod config;
pub mod engine;
pub mod market_data;
pub mod models;
pub mod repositories;
pub mod services;

// pub use = re-export at crate root
pub use config::CoreConfig;
pub use engine::{EngineError, MatchingEngine};
pub use market_data::{OrderBookFeed, OrderBookPoller, OrderBookSubscriber};
pub use models::{Order, OrderBook, OrderSide, OrderStatus, OrderType, Position, Trade};
pub use services::{MarketSettlementService, OrderPlacementService, PlacementRequest};

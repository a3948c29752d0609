//! Matching Engine Module
//!
//! - `errors` - Error types for engine operations
//! - `validation` - Order validation functions
//! - `book` - Resting-order arena and price levels for one market
//! - `matching` - Price-time priority matching algorithm
//! - `matching_engine` - Per-market partitioned engine

pub mod book;
pub mod errors;
pub mod matching;
pub mod matching_engine;
pub mod validation;

pub use book::MarketBook;
pub use errors::EngineError;
pub use matching::{crosses, match_order, MatchPolicy, PRICE_TOLERANCE};
pub use matching_engine::MatchingEngine;
pub use validation::validate_order;

//! Application services
//!
//! - `placement` - Order submission: validation, funds check, persistence and matching
//! - `settlement` - Payouts for resolved markets
//! - `errors` - Service error types

pub mod errors;
pub mod placement;
pub mod settlement;

pub use errors::{PlacementError, SettlementError};
pub use placement::{OrderPlacementService, PlacementReceipt, PlacementRequest};
pub use settlement::MarketSettlementService;

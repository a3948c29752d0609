/// Collaborator contracts the core depends on, with in-memory implementations
///
/// The concrete storage engine is supplied by the embedding application; the
/// in-memory versions back the demo binary and the tests.
pub mod account_service;
pub mod error;
pub mod order_repository;
pub mod position_repository;
pub mod settlement_repository;

pub use account_service::{AccountService, InMemoryAccountService};
pub use error::RepositoryError;
pub use order_repository::{sort_price_time, InMemoryOrderRepository, OrderRepository};
pub use position_repository::{InMemoryPositionRepository, PositionRepository};
pub use settlement_repository::{InMemorySettlementRepository, SettlementRepository};

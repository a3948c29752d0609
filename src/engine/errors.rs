//! Error types for matching engine operations

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while placing, cancelling or looking up orders in the engine
///
/// # Error Categories
///
/// - **Validation Errors**: `InvalidPrice`, `InvalidQuantity`
/// - **State Errors**: `OrderNotFound`, `OrderNotActive`, `DuplicateOrder`
/// - **Internal Errors**: `InvariantViolation` (a bug, never a recoverable condition)
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("{0}")]
    InvalidPrice(String),

    #[error("{0}")]
    InvalidQuantity(String),

    #[error("Duplicate order: {0}")]
    DuplicateOrder(Uuid),

    /// The order is already filled or cancelled
    #[error("Order already filled or cancelled: {0}")]
    OrderNotActive(Uuid),

    /// Resting state disagrees with itself (e.g. an indexed order is missing from its book)
    #[error("Matching invariant violated: {0}")]
    InvariantViolation(String),
}

impl EngineError {
    /// Returns true if this is a validation error
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidPrice(_) | EngineError::InvalidQuantity(_)
        )
    }

    /// Returns true if this is a state error (order doesn't exist or wrong state)
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            EngineError::OrderNotFound(_)
                | EngineError::OrderNotActive(_)
                | EngineError::DuplicateOrder(_)
        )
    }

    /// Invariant violations mean the in-memory book can no longer be trusted
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::InvariantViolation(_))
    }
}

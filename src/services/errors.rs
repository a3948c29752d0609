//! Error types for placement and settlement

use thiserror::Error;

use crate::engine::EngineError;
use crate::models::AccountId;
use crate::repositories::RepositoryError;

/// Errors returned by `OrderPlacementService`
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlacementError {
    /// Rejected before any state change
    #[error("{0}")]
    Validation(String),

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl PlacementError {
    pub fn is_validation_error(&self) -> bool {
        match self {
            PlacementError::Validation(_) => true,
            PlacementError::Engine(e) => e.is_validation_error(),
            _ => false,
        }
    }

    pub fn is_repository_error(&self) -> bool {
        matches!(self, PlacementError::Repository(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, PlacementError::Engine(e) if e.is_fatal())
    }
}

/// Errors returned by `MarketSettlementService`
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SettlementError {
    #[error("no positions found for market")]
    NoPositions,

    #[error("market {0} is already settled")]
    AlreadySettled(String),

    #[error("market {0} is being settled")]
    SettlementInProgress(String),

    /// Strict mode only: a position's owner could not be resolved
    #[error("unknown account {account_id} holds a position in market {market_id}")]
    UnknownAccount {
        market_id: String,
        account_id: AccountId,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl SettlementError {
    /// Returns true if a repeated call hit an already settled or settling market
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            SettlementError::AlreadySettled(_) | SettlementError::SettlementInProgress(_)
        )
    }

    pub fn is_repository_error(&self) -> bool {
        matches!(self, SettlementError::Repository(_))
    }
}

use parking_lot::RwLock;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{Order, Position};

use super::error::RepositoryError;

/// Position (bet) persistence
pub trait PositionRepository: Send + Sync {
    /// Record a filled leg of `order` as a position
    fn save_position(
        &self,
        order: &Order,
        executed_amount: Decimal,
        executed_price: Decimal,
    ) -> Result<Position, RepositoryError>;

    /// Positions in a market that have not been settled yet
    fn find_unsettled_by_market(&self, market_id: &str) -> Result<Vec<Position>, RepositoryError>;

    fn find_by_account(&self, account_id: &str) -> Result<Vec<Position>, RepositoryError>;

    /// Flag a position settled with its outcome. A position settles exactly once.
    fn mark_settled(&self, position_id: Uuid, won: bool) -> Result<(), RepositoryError>;
}

/// In-memory position store, kept in creation order
#[derive(Default)]
pub struct InMemoryPositionRepository {
    positions: RwLock<Vec<Position>>,
}

impl InMemoryPositionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Position> {
        self.positions.read().clone()
    }
}

impl PositionRepository for InMemoryPositionRepository {
    fn save_position(
        &self,
        order: &Order,
        executed_amount: Decimal,
        executed_price: Decimal,
    ) -> Result<Position, RepositoryError> {
        let position = Position::from_fill(order, executed_amount, executed_price);
        self.positions.write().push(position.clone());
        Ok(position)
    }

    fn find_unsettled_by_market(&self, market_id: &str) -> Result<Vec<Position>, RepositoryError> {
        Ok(self
            .positions
            .read()
            .iter()
            .filter(|p| p.market_id == market_id && !p.settled)
            .cloned()
            .collect())
    }

    fn find_by_account(&self, account_id: &str) -> Result<Vec<Position>, RepositoryError> {
        Ok(self
            .positions
            .read()
            .iter()
            .filter(|p| p.account_id == account_id)
            .cloned()
            .collect())
    }

    fn mark_settled(&self, position_id: Uuid, won: bool) -> Result<(), RepositoryError> {
        let mut positions = self.positions.write();
        let position = positions
            .iter_mut()
            .find(|p| p.id == position_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("position {}", position_id)))?;

        if position.settled {
            return Err(RepositoryError::Conflict(format!(
                "position {} already settled",
                position_id
            )));
        }
        position.settled = true;
        position.won = Some(won);
        Ok(())
    }
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::{AccountId, MarketId, OrderSide};

/// Lifecycle of a market with respect to settlement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketStatus {
    #[default]
    Open,
    Settling,
    Settled,
}

/// Immutable audit record of one settled position
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SettlementRecord {
    pub id: Uuid,
    pub market_id: MarketId,
    pub account_id: AccountId,
    pub position_id: Uuid,
    pub stake: Decimal,
    pub payout: Decimal,
    pub won: bool,
    pub timestamp: DateTime<Utc>,
}

impl SettlementRecord {
    pub fn new(
        market_id: MarketId,
        account_id: AccountId,
        position_id: Uuid,
        stake: Decimal,
        payout: Decimal,
        won: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            market_id,
            account_id,
            position_id,
            stake,
            payout,
            won,
            timestamp: Utc::now(),
        }
    }
}

/// Result of settling a market
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SettlementSummary {
    pub market_id: MarketId,
    pub winning_side: OrderSide,
    /// Positions whose payout was applied and recorded
    pub positions_settled: usize,
    /// Sum of winning payouts only; losses are not included
    pub total_payout: Decimal,
    /// Positions skipped because their account could not be resolved
    pub skipped: usize,
    pub settled_at: DateTime<Utc>,
}

impl SettlementSummary {
    pub fn new(market_id: MarketId, winning_side: OrderSide) -> Self {
        Self {
            market_id,
            winning_side,
            positions_settled: 0,
            total_payout: Decimal::ZERO,
            skipped: 0,
            settled_at: Utc::now(),
        }
    }

    /// Account for one settled position
    pub fn record(&mut self, payout: Decimal, won: bool) {
        self.positions_settled += 1;
        if won {
            self.total_payout += payout;
        }
    }
}

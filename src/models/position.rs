use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::{AccountId, MarketId, Order, OrderSide};

/// A filled exposure on a binary market, created when a trade fills one leg
/// of an order. Mutated exactly once, by settlement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub id: Uuid,
    pub account_id: AccountId,
    pub market_id: MarketId,
    pub order_id: Uuid,
    pub side: OrderSide,
    /// Amount risked (executed size)
    pub stake: Decimal,
    /// Execution price, a probability-like value in (0, 1)
    pub entry_price: Decimal,
    pub settled: bool,
    /// `None` until the market resolves
    pub won: Option<bool>,
    pub created_at: DateTime<Utc>,
}

impl Position {
    /// Open a position for one filled leg of an order
    pub fn from_fill(order: &Order, executed_amount: Decimal, executed_price: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id: order.account_id.clone(),
            market_id: order.market_id.clone(),
            order_id: order.id,
            side: order.side,
            stake: executed_amount,
            entry_price: executed_price,
            settled: false,
            won: None,
            created_at: Utc::now(),
        }
    }

    /// Binary-contract payout once the market resolves.
    ///
    /// A winning unit pays 1, so the profit is `stake * (1 - entry_price)`;
    /// a losing position forfeits what was paid, `-stake * entry_price`.
    pub fn payout(&self, winning_side: OrderSide) -> Decimal {
        if self.side == winning_side {
            self.stake * (Decimal::ONE - self.entry_price)
        } else {
            -self.stake * self.entry_price
        }
    }

    pub fn is_winner(&self, winning_side: OrderSide) -> bool {
        self.side == winning_side
    }
}

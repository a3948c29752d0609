use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::{AccountId, MarketId, OrderSide};

/// Immutable record of one match between a buy and a sell order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trade {
    pub id: Uuid,
    pub market_id: MarketId,
    pub price: Decimal,
    pub quantity: Decimal,
    pub buy_order_id: Uuid,
    pub sell_order_id: Uuid,
    pub buyer_id: AccountId,
    pub seller_id: AccountId,
    /// Side of the incoming (aggressor) order
    pub taker_side: OrderSide,
    /// Engine-wide monotonic sequence, preserves submission order across the trade log
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
}

impl Trade {
    /// Create a new trade
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        market_id: MarketId,
        price: Decimal,
        quantity: Decimal,
        buy_order_id: Uuid,
        sell_order_id: Uuid,
        buyer_id: AccountId,
        seller_id: AccountId,
        taker_side: OrderSide,
        sequence: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            market_id,
            price,
            quantity,
            buy_order_id,
            sell_order_id,
            buyer_id,
            seller_id,
            taker_side,
            sequence,
            timestamp: Utc::now(),
        }
    }

    /// Get the total trade value (what the buyer pays)
    pub fn value(&self) -> Decimal {
        self.price * self.quantity
    }

    /// Order id of the given leg
    pub fn order_id(&self, side: OrderSide) -> Uuid {
        match side {
            OrderSide::Buy => self.buy_order_id,
            OrderSide::Sell => self.sell_order_id,
        }
    }
}

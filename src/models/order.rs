use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Market identifier (one binary question, e.g. "match-1234")
pub type MarketId = String;

/// Account identifier of the order/position owner
pub type AccountId = String;

/// Represents a buy/sell instruction on a binary market
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub account_id: AccountId,
    pub market_id: MarketId,
    pub side: OrderSide,
    /// Absent for market orders
    pub price: Option<Decimal>,
    pub quantity: Decimal,
    pub filled_quantity: Decimal,
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
    /// Monotonic submission sequence, assigned by the engine. Used for time priority.
    #[serde(default)]
    pub sequence: u64,
}

/// Order side: Buy or Sell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

/// Order type: Limit or Market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
}

/// Order status throughout its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

impl Order {
    /// Create a new order. A `None` price makes it a market order.
    pub fn new(
        account_id: impl Into<AccountId>,
        market_id: impl Into<MarketId>,
        side: OrderSide,
        price: Option<Decimal>,
        quantity: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id: account_id.into(),
            market_id: market_id.into(),
            side,
            price,
            quantity,
            filled_quantity: Decimal::ZERO,
            status: OrderStatus::New,
            timestamp: Utc::now(),
            sequence: 0,
        }
    }

    /// Shorthand for a limit order
    pub fn limit(
        account_id: impl Into<AccountId>,
        market_id: impl Into<MarketId>,
        side: OrderSide,
        price: Decimal,
        quantity: Decimal,
    ) -> Self {
        Self::new(account_id, market_id, side, Some(price), quantity)
    }

    /// Shorthand for a market order
    pub fn market(
        account_id: impl Into<AccountId>,
        market_id: impl Into<MarketId>,
        side: OrderSide,
        quantity: Decimal,
    ) -> Self {
        Self::new(account_id, market_id, side, None, quantity)
    }

    pub fn order_type(&self) -> OrderType {
        if self.price.is_some() {
            OrderType::Limit
        } else {
            OrderType::Market
        }
    }

    pub fn is_market(&self) -> bool {
        self.price.is_none()
    }

    /// Get the remaining unfilled quantity
    pub fn remaining_quantity(&self) -> Decimal {
        self.quantity - self.filled_quantity
    }

    /// Check if the order is fully filled
    pub fn is_filled(&self) -> bool {
        self.filled_quantity >= self.quantity
    }

    /// New or partially filled orders can still trade or be cancelled
    pub fn is_active(&self) -> bool {
        matches!(self.status, OrderStatus::New | OrderStatus::PartiallyFilled)
    }

    /// Update order status based on filled quantity
    pub fn update_status(&mut self) {
        if self.is_filled() {
            self.status = OrderStatus::Filled;
        } else if self.filled_quantity > Decimal::ZERO {
            self.status = OrderStatus::PartiallyFilled;
        }
    }

    /// Fill the order with a given quantity
    pub fn fill(&mut self, quantity: Decimal) {
        self.filled_quantity += quantity;
        self.update_status();
    }
}

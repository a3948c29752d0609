use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::order::{MarketId, Order, OrderSide};

/// Aggregated quantity resting at one (rounded) price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Rounded price. Resting market orders are grouped under `Decimal::ZERO`.
    pub price: Decimal,
    pub quantity: Decimal,
    pub order_count: usize,
}

impl PriceLevel {
    /// Create a new, empty price level
    pub fn new(price: Decimal) -> Self {
        Self {
            price,
            quantity: Decimal::ZERO,
            order_count: 0,
        }
    }

    /// Add an order's remaining quantity to this level
    pub fn add(&mut self, quantity: Decimal) {
        self.quantity += quantity;
        self.order_count += 1;
    }
}

/// Point-in-time, display-oriented view of one market's resting orders.
///
/// Derived, not authoritative: bids are sorted by descending price, asks by
/// ascending price, and each level sums the remaining quantity of every order
/// whose price rounds to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    pub market_id: MarketId,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    /// Engine sequence at the time the view was taken
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
}

/// Round a price to the level key used for display aggregation.
///
/// Limit prices never land on the market-order level: anything that rounds
/// to zero or below is shown at the smallest tick.
pub fn level_price(price: Option<Decimal>, precision: u32) -> Decimal {
    match price {
        Some(p) => {
            let rounded =
                p.round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero);
            if rounded > Decimal::ZERO {
                rounded.normalize()
            } else {
                Decimal::new(1, precision).normalize()
            }
        }
        None => Decimal::ZERO,
    }
}

impl OrderBook {
    /// Create an empty view for a market
    pub fn empty(market_id: impl Into<MarketId>) -> Self {
        Self {
            market_id: market_id.into(),
            bids: Vec::new(),
            asks: Vec::new(),
            sequence: 0,
            timestamp: Utc::now(),
        }
    }

    /// Aggregate resting orders into price levels
    pub fn aggregate<'a>(
        market_id: impl Into<MarketId>,
        orders: impl IntoIterator<Item = &'a Order>,
        precision: u32,
        sequence: u64,
    ) -> Self {
        let mut bids: BTreeMap<Decimal, PriceLevel> = BTreeMap::new();
        let mut asks: BTreeMap<Decimal, PriceLevel> = BTreeMap::new();

        for order in orders {
            let remaining = order.remaining_quantity();
            if remaining <= Decimal::ZERO {
                continue;
            }
            let key = level_price(order.price, precision);
            let levels = match order.side {
                OrderSide::Buy => &mut bids,
                OrderSide::Sell => &mut asks,
            };
            levels
                .entry(key)
                .or_insert_with(|| PriceLevel::new(key))
                .add(remaining);
        }

        Self {
            market_id: market_id.into(),
            bids: bids.into_values().rev().collect(),
            asks: asks.into_values().collect(),
            sequence,
            timestamp: Utc::now(),
        }
    }

    /// Get the best bid price (highest buy price)
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids
            .iter()
            .find(|level| level.price > Decimal::ZERO)
            .map(|level| level.price)
    }

    /// Get the best ask price (lowest sell price)
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks
            .iter()
            .find(|level| level.price > Decimal::ZERO)
            .map(|level| level.price)
    }

    /// Get the spread (difference between best ask and best bid)
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_ask(), self.best_bid()) {
            (Some(ask), Some(bid)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Get the mid price (average of best bid and best ask)
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_ask(), self.best_bid()) {
            (Some(ask), Some(bid)) => Some((ask + bid) / Decimal::from(2)),
            _ => None,
        }
    }

    /// Get total depth on bid side
    pub fn bid_depth(&self) -> Decimal {
        Self::calculate_depth(&self.bids)
    }

    /// Get total depth on ask side
    pub fn ask_depth(&self) -> Decimal {
        Self::calculate_depth(&self.asks)
    }

    fn calculate_depth(levels: &[PriceLevel]) -> Decimal {
        levels.iter().map(|level| level.quantity).sum()
    }

    /// True when both views show the same levels, ignoring timestamps
    pub fn same_levels(&self, other: &OrderBook) -> bool {
        self.market_id == other.market_id && self.bids == other.bids && self.asks == other.asks
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

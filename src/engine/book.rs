//! Resting-order state for a single market
//!
//! Orders live in one arena keyed by id; the price levels only hold ids in
//! arrival order. Every mutation goes through `MarketBook`, which the engine
//! only hands out behind the market's lock.

use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, VecDeque};
use uuid::Uuid;

use crate::models::{MarketId, Order, OrderBook, OrderSide, Trade};

use super::errors::EngineError;

/// FIFO queues of order ids keyed by exact price, plus a queue of resting market orders
#[derive(Debug, Default)]
struct SideLevels {
    levels: BTreeMap<Decimal, VecDeque<Uuid>>,
    market: VecDeque<Uuid>,
}

impl SideLevels {
    fn push(&mut self, order_id: Uuid, price: Option<Decimal>) {
        match price {
            Some(p) => self.levels.entry(p).or_default().push_back(order_id),
            None => self.market.push_back(order_id),
        }
    }

    fn remove(&mut self, order_id: Uuid, price: Option<Decimal>) -> bool {
        let queue = match price {
            Some(p) => match self.levels.get_mut(&p) {
                Some(queue) => queue,
                None => return false,
            },
            None => &mut self.market,
        };

        let Some(pos) = queue.iter().position(|&id| id == order_id) else {
            return false;
        };
        queue.remove(pos);

        if let Some(p) = price {
            if self.levels.get(&p).is_some_and(|q| q.is_empty()) {
                self.levels.remove(&p);
            }
        }
        true
    }

    fn len(&self) -> usize {
        self.market.len() + self.levels.values().map(VecDeque::len).sum::<usize>()
    }
}

/// Resting orders and trade history for one market
#[derive(Debug)]
pub struct MarketBook {
    pub(crate) market_id: MarketId,
    pub(crate) orders: HashMap<Uuid, Order>,
    bids: SideLevels,
    asks: SideLevels,
    pub(crate) trades: Vec<Trade>,
}

impl MarketBook {
    pub fn new(market_id: impl Into<MarketId>) -> Self {
        Self {
            market_id: market_id.into(),
            orders: HashMap::new(),
            bids: SideLevels::default(),
            asks: SideLevels::default(),
            trades: Vec::new(),
        }
    }

    pub fn market_id(&self) -> &str {
        &self.market_id
    }

    fn side_mut(&mut self, side: OrderSide) -> &mut SideLevels {
        match side {
            OrderSide::Buy => &mut self.bids,
            OrderSide::Sell => &mut self.asks,
        }
    }

    fn side(&self, side: OrderSide) -> &SideLevels {
        match side {
            OrderSide::Buy => &self.bids,
            OrderSide::Sell => &self.asks,
        }
    }

    pub fn contains(&self, order_id: Uuid) -> bool {
        self.orders.contains_key(&order_id)
    }

    pub fn get(&self, order_id: Uuid) -> Option<&Order> {
        self.orders.get(&order_id)
    }

    /// Number of resting orders on both sides
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Add an order to its side of the book
    pub fn insert(&mut self, order: Order) {
        let (id, side, price) = (order.id, order.side, order.price);
        self.orders.insert(id, order);
        self.side_mut(side).push(id, price);
    }

    /// Remove an order from the arena and its price level
    pub fn remove(&mut self, order_id: Uuid) -> Result<Order, EngineError> {
        let order = self
            .orders
            .remove(&order_id)
            .ok_or(EngineError::OrderNotFound(order_id))?;

        if !self.side_mut(order.side).remove(order_id, order.price) {
            return Err(EngineError::InvariantViolation(format!(
                "order {} present in {} arena but not in its price level",
                order_id, self.market_id
            )));
        }
        Ok(order)
    }

    /// Ids of resting orders on `side`, best first.
    ///
    /// Market orders come first (they cross any price), then price levels
    /// (ascending for asks, descending for bids), FIFO within each level.
    pub fn priority_ids(&self, side: OrderSide) -> Vec<Uuid> {
        let levels = self.side(side);
        let mut ids: Vec<Uuid> = levels.market.iter().copied().collect();

        match side {
            OrderSide::Sell => {
                for queue in levels.levels.values() {
                    ids.extend(queue.iter().copied());
                }
            }
            OrderSide::Buy => {
                for queue in levels.levels.values().rev() {
                    ids.extend(queue.iter().copied());
                }
            }
        }
        ids
    }

    /// Resting orders on `side` in price-time priority
    pub fn resting_orders(&self, side: OrderSide) -> Vec<Order> {
        self.priority_ids(side)
            .into_iter()
            .filter_map(|id| self.orders.get(&id).cloned())
            .collect()
    }

    /// Best limit price on `side`
    pub fn best_price(&self, side: OrderSide) -> Option<Decimal> {
        let levels = &self.side(side).levels;
        match side {
            OrderSide::Buy => levels.keys().next_back().copied(),
            OrderSide::Sell => levels.keys().next().copied(),
        }
    }

    /// Check that the arena and the level queues describe the same orders
    pub fn check_consistency(&self) -> Result<(), EngineError> {
        let indexed = self.bids.len() + self.asks.len();
        if indexed != self.orders.len() {
            return Err(EngineError::InvariantViolation(format!(
                "{}: {} orders in arena, {} in price levels",
                self.market_id,
                self.orders.len(),
                indexed
            )));
        }
        if let Some(order) = self.orders.values().find(|o| o.is_filled()) {
            return Err(EngineError::InvariantViolation(format!(
                "{}: filled order {} still resting",
                self.market_id, order.id
            )));
        }
        Ok(())
    }

    /// Aggregated display view of the current resting orders
    pub fn snapshot(&self, precision: u32, sequence: u64) -> OrderBook {
        OrderBook::aggregate(self.market_id.clone(), self.orders.values(), precision, sequence)
    }

    /// Last `limit` trades, oldest first
    pub fn recent_trades(&self, limit: usize) -> Vec<Trade> {
        let start = self.trades.len().saturating_sub(limit);
        self.trades[start..].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn limit(side: OrderSide, price: Decimal, qty: Decimal) -> Order {
        Order::limit("alice", "m1", side, price, qty)
    }

    #[test]
    fn test_insert_and_remove() {
        let mut book = MarketBook::new("m1");
        let order = limit(OrderSide::Buy, dec!(0.40), dec!(10));
        let id = order.id;

        book.insert(order);
        assert!(book.contains(id));
        assert_eq!(book.best_price(OrderSide::Buy), Some(dec!(0.40)));

        let removed = book.remove(id).unwrap();
        assert_eq!(removed.id, id);
        assert!(book.is_empty());
        assert_eq!(book.best_price(OrderSide::Buy), None);
        assert!(book.check_consistency().is_ok());
    }

    #[test]
    fn test_remove_unknown_order() {
        let mut book = MarketBook::new("m1");
        let id = Uuid::new_v4();
        assert_eq!(book.remove(id), Err(EngineError::OrderNotFound(id)));
    }

    #[test]
    fn test_priority_order_for_asks() {
        let mut book = MarketBook::new("m1");
        let high = limit(OrderSide::Sell, dec!(0.60), dec!(1));
        let low_first = limit(OrderSide::Sell, dec!(0.55), dec!(1));
        let low_second = limit(OrderSide::Sell, dec!(0.55), dec!(1));
        let market = Order::market("bob", "m1", OrderSide::Sell, dec!(1));
        let ids = [market.id, low_first.id, low_second.id, high.id];

        book.insert(high);
        book.insert(low_first);
        book.insert(low_second);
        book.insert(market);

        assert_eq!(book.priority_ids(OrderSide::Sell), ids.to_vec());
    }

    #[test]
    fn test_priority_order_for_bids() {
        let mut book = MarketBook::new("m1");
        let low = limit(OrderSide::Buy, dec!(0.30), dec!(1));
        let high = limit(OrderSide::Buy, dec!(0.35), dec!(1));
        let ids = [high.id, low.id];

        book.insert(low);
        book.insert(high);

        assert_eq!(book.priority_ids(OrderSide::Buy), ids.to_vec());
        assert_eq!(book.best_price(OrderSide::Buy), Some(dec!(0.35)));
    }

    #[test]
    fn test_level_removed_when_empty() {
        let mut book = MarketBook::new("m1");
        let a = limit(OrderSide::Sell, dec!(0.55), dec!(1));
        let b = limit(OrderSide::Sell, dec!(0.60), dec!(1));
        let a_id = a.id;
        book.insert(a);
        book.insert(b);

        book.remove(a_id).unwrap();
        assert_eq!(book.best_price(OrderSide::Sell), Some(dec!(0.60)));
    }
}

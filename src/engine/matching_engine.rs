//! Matching Engine
//!
//! Owns one `MarketBook` per market, each behind its own mutex. Placements and
//! cancellations for the same market are serialized by that mutex; different
//! markets never contend. Nothing in here blocks on I/O.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::CoreConfig;
use crate::models::{MarketId, Order, OrderBook, OrderSide, OrderStatus, Trade};

use super::book::MarketBook;
use super::errors::EngineError;
use super::matching::{match_order, MatchPolicy};
use super::validation::validate_order;

/// Thread-safe, per-market partitioned matching engine
pub struct MatchingEngine {
    books: DashMap<MarketId, Arc<Mutex<MarketBook>>>,
    /// Resting order id -> market, for cancellation and lookup
    order_index: DashMap<Uuid, MarketId>,
    /// Engine-wide sequence shared by order submissions and trades
    sequence: AtomicU64,
    policy: MatchPolicy,
    price_precision: u32,
}

impl MatchingEngine {
    /// Create an engine with default policies
    pub fn new() -> Self {
        Self::with_config(&CoreConfig::default())
    }

    pub fn with_config(config: &CoreConfig) -> Self {
        Self {
            books: DashMap::new(),
            order_index: DashMap::new(),
            sequence: AtomicU64::new(0),
            policy: MatchPolicy {
                market_cross: config.market_cross,
                market_remainder: config.market_remainder,
            },
            price_precision: config.price_precision,
        }
    }

    /// Get or create the book for a market.
    ///
    /// The map guard is released before the caller locks the book.
    fn book(&self, market_id: &str) -> Arc<Mutex<MarketBook>> {
        if let Some(book) = self.books.get(market_id) {
            return Arc::clone(book.value());
        }
        self.books
            .entry(market_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(MarketBook::new(market_id))))
            .value()
            .clone()
    }

    fn existing_book(&self, market_id: &str) -> Option<Arc<Mutex<MarketBook>>> {
        self.books.get(market_id).map(|b| Arc::clone(b.value()))
    }

    /// Run a read-only closure against a market's book under its lock
    fn with_book<R>(&self, market_id: &str, f: impl FnOnce(&MarketBook) -> R) -> Option<R> {
        let book = self.existing_book(market_id)?;
        let guard = book.lock();
        Some(f(&guard))
    }

    /// Match an incoming order and rest or cancel its remainder.
    ///
    /// Returns the incoming order in its final state together with the trades
    /// produced by this call, in execution order.
    pub fn place_order(&self, mut order: Order) -> Result<(Order, Vec<Trade>), EngineError> {
        validate_order(&order)?;

        if self.order_index.contains_key(&order.id) {
            return Err(EngineError::DuplicateOrder(order.id));
        }

        let book = self.book(&order.market_id);
        let mut book = book.lock();

        if book.contains(order.id) {
            return Err(EngineError::DuplicateOrder(order.id));
        }

        order.sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;

        let trades = match match_order(&mut book, &mut order, &self.policy, &self.sequence) {
            Ok(trades) => trades,
            Err(e) => {
                if e.is_fatal() {
                    tracing::error!(market = %order.market_id, order = %order.id, "{}", e);
                }
                return Err(e);
            }
        };

        // Resting legs that were filled have left the book
        let resting_side = order.side.opposite();
        for trade in &trades {
            let resting_id = trade.order_id(resting_side);
            if !book.contains(resting_id) {
                self.order_index.remove(&resting_id);
            }
        }
        if book.contains(order.id) {
            self.order_index.insert(order.id, order.market_id.clone());
        }

        tracing::debug!(
            market = %order.market_id,
            order = %order.id,
            trades = trades.len(),
            status = ?order.status,
            "order processed"
        );

        Ok((order, trades))
    }

    /// Withdraw a resting order (RESTING -> CANCELLED)
    pub fn cancel_order(&self, order_id: Uuid) -> Result<Order, EngineError> {
        let market_id = self
            .order_index
            .get(&order_id)
            .map(|m| m.value().clone())
            .ok_or(EngineError::OrderNotFound(order_id))?;

        let book = self
            .existing_book(&market_id)
            .ok_or(EngineError::OrderNotFound(order_id))?;
        let mut book = book.lock();

        let mut order = book.remove(order_id)?;
        self.order_index.remove(&order_id);
        order.status = OrderStatus::Cancelled;

        tracing::info!(market = %market_id, order = %order_id, "order cancelled");
        Ok(order)
    }

    /// Get a resting order
    pub fn get_order(&self, order_id: Uuid) -> Option<Order> {
        let market_id = self.order_index.get(&order_id)?.value().clone();
        self.with_book(&market_id, |book| book.get(order_id).cloned())
            .flatten()
    }

    /// Aggregated view of a market's resting orders
    pub fn snapshot(&self, market_id: &str) -> OrderBook {
        self.with_book(market_id, |book| {
            book.snapshot(self.price_precision, self.sequence.load(Ordering::SeqCst))
        })
        .unwrap_or_else(|| OrderBook::empty(market_id))
    }

    /// Resting orders on one side of a market, in price-time priority
    pub fn open_orders(&self, market_id: &str, side: OrderSide) -> Vec<Order> {
        self.with_book(market_id, |book| book.resting_orders(side))
            .unwrap_or_default()
    }

    /// Get recent trades for a market, oldest first
    pub fn recent_trades(&self, market_id: &str, limit: usize) -> Vec<Trade> {
        self.with_book(market_id, |book| book.recent_trades(limit))
            .unwrap_or_default()
    }

    /// Every trade executed by this engine, in execution order
    pub fn trade_log(&self) -> Vec<Trade> {
        let books: Vec<_> = self.books.iter().map(|b| Arc::clone(b.value())).collect();
        let mut trades: Vec<Trade> = books
            .iter()
            .flat_map(|book| book.lock().trades.clone())
            .collect();
        trades.sort_by_key(|t| t.sequence);
        trades
    }

    /// Markets that have seen at least one order
    pub fn markets(&self) -> Vec<MarketId> {
        self.books.iter().map(|b| b.key().clone()).collect()
    }

    /// Get total number of resting orders across all markets
    pub fn total_resting_orders(&self) -> usize {
        self.order_index.len()
    }

    /// Current engine sequence
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::thread;

    #[test]
    fn test_add_and_match_order() {
        let engine = MatchingEngine::new();

        let sell = Order::limit("seller1", "m1", OrderSide::Sell, dec!(0.60), dec!(100));
        let (order, trades) = engine.place_order(sell).unwrap();
        assert!(trades.is_empty());
        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(engine.total_resting_orders(), 1);

        let buy = Order::limit("buyer1", "m1", OrderSide::Buy, dec!(0.60), dec!(50));
        let (order, trades) = engine.place_order(buy).unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].quantity, dec!(50));
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(engine.total_resting_orders(), 1);
    }

    #[test]
    fn test_filled_resting_order_leaves_index() {
        let engine = MatchingEngine::new();
        let sell = Order::limit("s", "m1", OrderSide::Sell, dec!(0.60), dec!(10));
        let sell_id = sell.id;
        engine.place_order(sell).unwrap();

        let buy = Order::limit("b", "m1", OrderSide::Buy, dec!(0.60), dec!(10));
        engine.place_order(buy).unwrap();

        assert!(engine.get_order(sell_id).is_none());
        assert_eq!(engine.total_resting_orders(), 0);
        assert!(engine.snapshot("m1").is_empty());
    }

    #[test]
    fn test_cancel_order() {
        let engine = MatchingEngine::new();
        let order = Order::limit("user1", "m1", OrderSide::Buy, dec!(0.30), dec!(100));
        let order_id = order.id;
        engine.place_order(order).unwrap();

        let cancelled = engine.cancel_order(order_id).unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert!(engine.get_order(order_id).is_none());
        assert!(engine.snapshot("m1").is_empty());

        assert_eq!(
            engine.cancel_order(order_id),
            Err(EngineError::OrderNotFound(order_id))
        );
    }

    #[test]
    fn test_invalid_orders_rejected_before_book() {
        let engine = MatchingEngine::new();

        let zero = Order::limit("u", "m1", OrderSide::Buy, dec!(0.30), dec!(0));
        assert!(engine.place_order(zero).unwrap_err().is_validation_error());

        let bad_price = Order::limit("u", "m1", OrderSide::Buy, dec!(-0.30), dec!(1));
        assert!(engine.place_order(bad_price).unwrap_err().is_validation_error());

        assert!(engine.markets().is_empty());
    }

    #[test]
    fn test_duplicate_order_rejected() {
        let engine = MatchingEngine::new();
        let order = Order::limit("u", "m1", OrderSide::Buy, dec!(0.30), dec!(1));
        engine.place_order(order.clone()).unwrap();

        assert_eq!(
            engine.place_order(order.clone()),
            Err(EngineError::DuplicateOrder(order.id))
        );
    }

    #[test]
    fn test_snapshot_aggregates_rounded_levels() {
        let engine = MatchingEngine::new();
        engine
            .place_order(Order::limit("a", "m1", OrderSide::Buy, dec!(0.3), dec!(4)))
            .unwrap();
        engine
            .place_order(Order::limit("b", "m1", OrderSide::Buy, dec!(0.30), dec!(6)))
            .unwrap();

        let book = engine.snapshot("m1");
        assert_eq!(book.bids.len(), 1);
        assert_eq!(book.bids[0].quantity, dec!(10));
        assert!(book.asks.is_empty());
    }

    #[test]
    fn test_snapshot_of_unknown_market_is_empty() {
        let engine = MatchingEngine::new();
        let book = engine.snapshot("nope");
        assert_eq!(book.market_id, "nope");
        assert!(book.is_empty());
    }

    #[test]
    fn test_submission_sequence_is_monotonic() {
        let engine = MatchingEngine::new();
        let (first, _) = engine
            .place_order(Order::limit("a", "m1", OrderSide::Buy, dec!(0.3), dec!(1)))
            .unwrap();
        let (second, _) = engine
            .place_order(Order::limit("a", "m2", OrderSide::Buy, dec!(0.3), dec!(1)))
            .unwrap();
        assert!(first.sequence < second.sequence);
    }

    #[test]
    fn test_trade_log_spans_markets_in_order() {
        let engine = MatchingEngine::new();
        for market in ["m1", "m2", "m1"] {
            engine
                .place_order(Order::limit("s", market, OrderSide::Sell, dec!(0.5), dec!(1)))
                .unwrap();
            engine
                .place_order(Order::limit("b", market, OrderSide::Buy, dec!(0.5), dec!(1)))
                .unwrap();
        }

        let log = engine.trade_log();
        assert_eq!(log.len(), 3);
        let markets: Vec<_> = log.iter().map(|t| t.market_id.as_str()).collect();
        assert_eq!(markets, vec!["m1", "m2", "m1"]);
        assert!(log.windows(2).all(|w| w[0].sequence < w[1].sequence));
        assert_eq!(engine.recent_trades("m1", 10).len(), 2);
    }

    #[test]
    fn test_concurrent_placements_keep_fill_accounting() {
        let engine = Arc::new(MatchingEngine::new());

        // 4 markets x 50 resting sells of 1 each
        for market in 0..4 {
            for _ in 0..50 {
                engine
                    .place_order(Order::limit(
                        "maker",
                        format!("m{}", market),
                        OrderSide::Sell,
                        dec!(0.5),
                        dec!(1),
                    ))
                    .unwrap();
            }
        }

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    let market = format!("m{}", t % 4);
                    let mut traded = rust_decimal::Decimal::ZERO;
                    for _ in 0..25 {
                        let buy = Order::limit("taker", market.clone(), OrderSide::Buy, dec!(0.5), dec!(1));
                        let (_, trades) = engine.place_order(buy).unwrap();
                        traded += trades.iter().map(|t| t.quantity).sum::<rust_decimal::Decimal>();
                    }
                    traded
                })
            })
            .collect();

        let total: rust_decimal::Decimal = handles.into_iter().map(|h| h.join().unwrap()).sum();

        // Every buy found exactly one resting sell; nothing was double-filled
        assert_eq!(total, dec!(200));
        assert_eq!(engine.total_resting_orders(), 0);
        assert_eq!(engine.trade_log().len(), 200);
        for market in engine.markets() {
            assert!(engine.snapshot(&market).is_empty());
        }
    }
}

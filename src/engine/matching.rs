use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use crate::config::{MarketCrossPolicy, MarketRemainderPolicy};
use crate::models::{Order, OrderSide, OrderStatus, Trade};

use super::book::MarketBook;
use super::errors::EngineError;

/// Slack applied to price comparisons so representation noise never blocks a cross
pub const PRICE_TOLERANCE: Decimal = dec!(0.000000001);

/// Policies for the cases where the incoming or resting leg has no price
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchPolicy {
    pub market_cross: MarketCrossPolicy,
    pub market_remainder: MarketRemainderPolicy,
}

/// Whether an incoming limit price crosses a resting limit price
pub fn crosses(incoming_side: OrderSide, incoming_price: Decimal, resting_price: Decimal) -> bool {
    match incoming_side {
        OrderSide::Buy => incoming_price >= resting_price - PRICE_TOLERANCE,
        OrderSide::Sell => incoming_price <= resting_price + PRICE_TOLERANCE,
    }
}

/// Execution price for a pair of legs. `None` means the pair must not trade.
fn execution_price(incoming: &Order, resting: &Order, policy: &MatchPolicy) -> Option<Decimal> {
    match (resting.price, incoming.price) {
        (Some(price), _) => Some(price),
        (None, Some(price)) => Some(price),
        (None, None) => match policy.market_cross {
            MarketCrossPolicy::Reject => None,
            MarketCrossPolicy::NominalPrice(price) => Some(price),
        },
    }
}

/// Result of looking at one resting candidate
enum Step {
    Traded,
    /// This candidate cannot trade, later ones still might
    Skip,
    /// Nothing further down the priority list can cross
    Stop,
}

/// Match an incoming order against the opposite side of `book`.
///
/// Trades are appended to the book's trade log and returned. Filled resting
/// orders are removed; the incoming remainder rests (limit) or is handled per
/// `policy.market_remainder` (market).
pub fn match_order(
    book: &mut MarketBook,
    incoming: &mut Order,
    policy: &MatchPolicy,
    sequence: &AtomicU64,
) -> Result<Vec<Trade>, EngineError> {
    if incoming.quantity <= Decimal::ZERO {
        return Err(EngineError::InvalidQuantity(
            "quantity must be positive".to_string(),
        ));
    }

    let candidates = book.priority_ids(incoming.side.opposite());
    let mut trades = Vec::new();

    for resting_id in candidates {
        if incoming.is_filled() {
            break;
        }

        match process_resting_order(book, incoming, resting_id, policy, sequence)? {
            Step::Traded => {
                if let Some(trade) = book.trades.last() {
                    trades.push(trade.clone());
                }
            }
            Step::Skip => continue,
            Step::Stop => break,
        }
    }

    handle_remainder(book, incoming, policy);

    Ok(trades)
}

/// Try to trade the incoming order against one resting order
fn process_resting_order(
    book: &mut MarketBook,
    incoming: &mut Order,
    resting_id: Uuid,
    policy: &MatchPolicy,
    sequence: &AtomicU64,
) -> Result<Step, EngineError> {
    let resting = book.orders.get_mut(&resting_id).ok_or_else(|| {
        EngineError::InvariantViolation(format!(
            "order {} listed in a price level but missing from the arena",
            resting_id
        ))
    })?;

    if let (Some(incoming_price), Some(resting_price)) = (incoming.price, resting.price) {
        if !crosses(incoming.side, incoming_price, resting_price) {
            return Ok(Step::Stop);
        }
    }

    let Some(price) = execution_price(incoming, resting, policy) else {
        tracing::debug!(
            incoming = %incoming.id,
            resting = %resting_id,
            "skipping market-vs-market cross without a reference price"
        );
        return Ok(Step::Skip);
    };

    let quantity = incoming.remaining_quantity().min(resting.remaining_quantity());
    if quantity <= Decimal::ZERO {
        return Ok(Step::Skip);
    }

    incoming.fill(quantity);
    resting.fill(quantity);

    let (buy, sell) = match incoming.side {
        OrderSide::Buy => (&*incoming, &*resting),
        OrderSide::Sell => (&*resting, &*incoming),
    };
    let trade = Trade::new(
        book.market_id.clone(),
        price,
        quantity,
        buy.id,
        sell.id,
        buy.account_id.clone(),
        sell.account_id.clone(),
        incoming.side,
        sequence.fetch_add(1, Ordering::SeqCst) + 1,
    );
    let resting_filled = resting.is_filled();

    tracing::debug!(
        market = %trade.market_id,
        trade = %trade.id,
        price = %trade.price,
        quantity = %trade.quantity,
        "trade executed"
    );
    book.trades.push(trade);

    if resting_filled {
        book.remove(resting_id)?;
    }

    Ok(Step::Traded)
}

/// Rest or cancel whatever the incoming order has left
fn handle_remainder(book: &mut MarketBook, incoming: &mut Order, policy: &MatchPolicy) {
    if incoming.is_filled() {
        return;
    }

    if !incoming.is_market() {
        book.insert(incoming.clone());
        return;
    }

    match policy.market_remainder {
        MarketRemainderPolicy::Cancel => {
            tracing::debug!(
                order = %incoming.id,
                remaining = %incoming.remaining_quantity(),
                "market order remainder cancelled"
            );
            incoming.status = OrderStatus::Cancelled;
        }
        MarketRemainderPolicy::Rest => book.insert(incoming.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit(account: &str, side: OrderSide, price: Decimal, qty: Decimal) -> Order {
        Order::limit(account, "m1", side, price, qty)
    }

    /// Book with the given resting orders inserted in order
    fn book_with(orders: Vec<Order>) -> MarketBook {
        let mut book = MarketBook::new("m1");
        for order in orders {
            book.insert(order);
        }
        book
    }

    fn run(book: &mut MarketBook, incoming: &mut Order) -> Vec<Trade> {
        let seq = AtomicU64::new(0);
        match_order(book, incoming, &MatchPolicy::default(), &seq).unwrap()
    }

    #[test]
    fn test_partial_fill_across_equal_prices() {
        let first = limit("s1", OrderSide::Sell, dec!(2.00), dec!(10));
        let second = limit("s2", OrderSide::Sell, dec!(2.00), dec!(10));
        let (first_id, second_id) = (first.id, second.id);
        let mut book = book_with(vec![first, second]);

        let mut buy = limit("b1", OrderSide::Buy, dec!(2.00), dec!(15));
        let trades = run(&mut book, &mut buy);

        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].sell_order_id, first_id);
        assert_eq!(trades[0].quantity, dec!(10));
        assert_eq!(trades[1].sell_order_id, second_id);
        assert_eq!(trades[1].quantity, dec!(5));
        assert!(trades[0].sequence < trades[1].sequence);

        assert!(buy.is_filled());
        assert_eq!(buy.status, OrderStatus::Filled);
        assert!(!book.contains(first_id));
        assert_eq!(book.get(second_id).unwrap().remaining_quantity(), dec!(5));
        assert!(book.check_consistency().is_ok());
    }

    #[test]
    fn test_price_priority_uses_lower_ask() {
        let expensive = limit("s1", OrderSide::Sell, dec!(2.00), dec!(5));
        let cheap = limit("s2", OrderSide::Sell, dec!(1.90), dec!(5));
        let cheap_id = cheap.id;
        let mut book = book_with(vec![expensive, cheap]);

        let mut buy = limit("b1", OrderSide::Buy, dec!(2.00), dec!(5));
        let trades = run(&mut book, &mut buy);

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].sell_order_id, cheap_id);
        assert_eq!(trades[0].price, dec!(1.90));
    }

    #[test]
    fn test_sell_hits_highest_bid_first() {
        let low = limit("b1", OrderSide::Buy, dec!(0.40), dec!(5));
        let high = limit("b2", OrderSide::Buy, dec!(0.45), dec!(5));
        let high_id = high.id;
        let mut book = book_with(vec![low, high]);

        let mut sell = limit("s1", OrderSide::Sell, dec!(0.40), dec!(5));
        let trades = run(&mut book, &mut sell);

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].buy_order_id, high_id);
        assert_eq!(trades[0].price, dec!(0.45));
        assert_eq!(trades[0].taker_side, OrderSide::Sell);
        assert_eq!(trades[0].buyer_id, "b2");
        assert_eq!(trades[0].seller_id, "s1");
    }

    #[test]
    fn test_market_order_trades_at_resting_price() {
        let mut book = book_with(vec![limit("s1", OrderSide::Sell, dec!(2.00), dec!(5))]);

        let mut buy = Order::market("b1", "m1", OrderSide::Buy, dec!(5));
        let trades = run(&mut book, &mut buy);

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].price, dec!(2.00));
        assert!(buy.is_filled());
    }

    #[test]
    fn test_market_order_without_liquidity_keeps_quantity() {
        let mut book = MarketBook::new("m1");

        let mut buy = Order::market("b1", "m1", OrderSide::Buy, dec!(5));
        let trades = run(&mut book, &mut buy);

        assert!(trades.is_empty());
        assert_eq!(buy.remaining_quantity(), dec!(5));
        assert_eq!(buy.status, OrderStatus::Cancelled);
        assert!(book.is_empty());
    }

    #[test]
    fn test_market_remainder_can_rest() {
        let mut book = MarketBook::new("m1");
        let policy = MatchPolicy {
            market_remainder: MarketRemainderPolicy::Rest,
            ..MatchPolicy::default()
        };

        let mut buy = Order::market("b1", "m1", OrderSide::Buy, dec!(5));
        let trades = match_order(&mut book, &mut buy, &policy, &AtomicU64::new(0)).unwrap();

        assert!(trades.is_empty());
        assert_eq!(buy.status, OrderStatus::New);
        assert!(book.contains(buy.id));

        // A later limit sell crosses the resting market order at the sell's price
        let mut sell = limit("s1", OrderSide::Sell, dec!(0.70), dec!(2));
        let trades = match_order(&mut book, &mut sell, &policy, &AtomicU64::new(0)).unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].price, dec!(0.70));
        assert_eq!(book.get(buy.id).unwrap().remaining_quantity(), dec!(3));
    }

    #[test]
    fn test_market_vs_market_rejected_by_default() {
        let resting = Order::market("s1", "m1", OrderSide::Sell, dec!(5));
        let resting_id = resting.id;
        let mut book = book_with(vec![
            resting,
            limit("s2", OrderSide::Sell, dec!(0.80), dec!(5)),
        ]);

        let mut buy = Order::market("b1", "m1", OrderSide::Buy, dec!(5));
        let trades = run(&mut book, &mut buy);

        // The resting market sell is skipped, the limit sell fills the order
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].price, dec!(0.80));
        assert!(book.contains(resting_id));
    }

    #[test]
    fn test_market_vs_market_nominal_price() {
        let mut book = book_with(vec![Order::market("s1", "m1", OrderSide::Sell, dec!(5))]);
        let policy = MatchPolicy {
            market_cross: MarketCrossPolicy::NominalPrice(dec!(1.0)),
            ..MatchPolicy::default()
        };

        let mut buy = Order::market("b1", "m1", OrderSide::Buy, dec!(5));
        let trades = match_order(&mut book, &mut buy, &policy, &AtomicU64::new(0)).unwrap();

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].price, dec!(1.0));
        assert!(book.is_empty());
    }

    #[test]
    fn test_no_match_when_prices_dont_cross() {
        let mut book = book_with(vec![limit("s1", OrderSide::Sell, dec!(0.60), dec!(10))]);

        let mut buy = limit("b1", OrderSide::Buy, dec!(0.55), dec!(5));
        let trades = run(&mut book, &mut buy);

        assert!(trades.is_empty());
        assert_eq!(buy.status, OrderStatus::New);
        assert!(book.contains(buy.id));
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn test_tolerance_absorbs_representation_noise() {
        let mut book = book_with(vec![limit("s1", OrderSide::Sell, dec!(0.3000000001), dec!(1))]);

        let mut buy = limit("b1", OrderSide::Buy, dec!(0.3), dec!(1));
        let trades = run(&mut book, &mut buy);

        assert_eq!(trades.len(), 1);
    }

    #[test]
    fn test_limit_remainder_rests_after_partial_fill() {
        let mut book = book_with(vec![limit("s1", OrderSide::Sell, dec!(0.50), dec!(4))]);

        let mut buy = limit("b1", OrderSide::Buy, dec!(0.50), dec!(10));
        let trades = run(&mut book, &mut buy);

        assert_eq!(trades.len(), 1);
        assert_eq!(buy.status, OrderStatus::PartiallyFilled);
        let resting = book.get(buy.id).unwrap();
        assert_eq!(resting.remaining_quantity(), dec!(6));
        assert_eq!(book.trades.len(), 1);
    }

    #[test]
    fn test_missing_arena_entry_is_an_invariant_violation() {
        let order = limit("s1", OrderSide::Sell, dec!(0.50), dec!(4));
        let id = order.id;
        let mut book = book_with(vec![order]);
        book.orders.remove(&id);

        let mut buy = limit("b1", OrderSide::Buy, dec!(0.50), dec!(1));
        let err = match_order(&mut book, &mut buy, &MatchPolicy::default(), &AtomicU64::new(0))
            .unwrap_err();
        assert!(err.is_fatal());
    }
}

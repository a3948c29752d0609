//! Order placement
//!
//! Entry point for submitting orders. Side effects happen in a fixed order:
//! validation, funds check, reservation, persist order, match, persist fills,
//! balance movements. Collaborator calls are made outside the engine's
//! per-market lock.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{BookkeepingMode, CoreConfig};
use crate::engine::validation::{validate_price, validate_quantity};
use crate::engine::{EngineError, MatchingEngine};
use crate::market_data::OrderBookFeed;
use crate::models::{AccountId, MarketId, Order, OrderSide, OrderStatus, Trade};
use crate::repositories::{AccountService, OrderRepository, PositionRepository, RepositoryError};

use super::errors::PlacementError;

/// An order submission. A missing price makes it a market order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementRequest {
    pub account_id: AccountId,
    pub market_id: MarketId,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
}

impl PlacementRequest {
    pub fn limit(
        account_id: impl Into<AccountId>,
        market_id: impl Into<MarketId>,
        side: OrderSide,
        price: Decimal,
        quantity: Decimal,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            market_id: market_id.into(),
            side,
            quantity,
            price: Some(price),
        }
    }

    pub fn market(
        account_id: impl Into<AccountId>,
        market_id: impl Into<MarketId>,
        side: OrderSide,
        quantity: Decimal,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            market_id: market_id.into(),
            side,
            quantity,
            price: None,
        }
    }
}

/// Outcome of a successful placement
#[derive(Debug, Clone, Serialize)]
pub struct PlacementReceipt {
    /// The order in its state after matching
    pub order: Order,
    pub trades: Vec<Trade>,
    pub summary: String,
}

pub struct OrderPlacementService {
    engine: Arc<MatchingEngine>,
    orders: Arc<dyn OrderRepository>,
    positions: Arc<dyn PositionRepository>,
    accounts: Arc<dyn AccountService>,
    config: CoreConfig,
    feed: Option<Arc<OrderBookFeed>>,
}

impl OrderPlacementService {
    pub fn new(
        engine: Arc<MatchingEngine>,
        orders: Arc<dyn OrderRepository>,
        positions: Arc<dyn PositionRepository>,
        accounts: Arc<dyn AccountService>,
        config: CoreConfig,
    ) -> Self {
        Self {
            engine,
            orders,
            positions,
            accounts,
            config,
            feed: None,
        }
    }

    /// Push a fresh snapshot to `feed` after every placement and cancellation
    pub fn with_feed(mut self, feed: Arc<OrderBookFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn engine(&self) -> &Arc<MatchingEngine> {
        &self.engine
    }

    /// Validate, fund-check, persist and match an order
    pub fn place(&self, request: PlacementRequest) -> Result<PlacementReceipt, PlacementError> {
        validate_quantity(request.quantity).map_err(|e| PlacementError::Validation(e.to_string()))?;
        validate_price(request.price).map_err(|e| PlacementError::Validation(e.to_string()))?;

        // Market orders have no price of their own; estimate at the nominal unit price
        let funds_price = request
            .price
            .unwrap_or(self.config.market_order_unit_price);
        let funded = self.accounts.has_sufficient_funds(
            &request.account_id,
            &request.market_id,
            request.quantity,
            funds_price,
        )?;
        if !funded {
            tracing::info!(
                account = %request.account_id,
                market = %request.market_id,
                "order rejected: insufficient funds"
            );
            return Err(PlacementError::InsufficientFunds);
        }

        let order = Order::new(
            request.account_id,
            request.market_id,
            request.side,
            request.price,
            request.quantity,
        );

        self.accounts
            .reserve_for_order(&order.account_id, order.id, order.quantity * funds_price)?;
        // Stored with sequence 0; the engine stamps it under the market lock and
        // `record_fills` writes it back. A crash mid-match leaves the 0 in place.
        self.orders.save(&order)?;

        let (order, trades) = match self.engine.place_order(order.clone()) {
            Ok(result) => result,
            Err(e) => {
                self.reject_persisted(order.id, &e);
                return Err(e.into());
            }
        };

        if let Err(e) = self.record_fills(&order, &trades) {
            let trade_ids: Vec<String> = trades.iter().map(|t| t.id.to_string()).collect();
            tracing::error!(
                order = %order.id,
                trades = ?trade_ids,
                "matched in memory but failed to persist fills: {}",
                e
            );
            return Err(e.into());
        }

        self.publish(&order.market_id);

        let summary = summarize(&order, &trades);
        tracing::info!(
            order = %order.id,
            account = %order.account_id,
            market = %order.market_id,
            side = ?order.side,
            "{}",
            summary
        );

        Ok(PlacementReceipt {
            order,
            trades,
            summary,
        })
    }

    /// Withdraw a resting order and persist the cancellation
    pub fn cancel(&self, order_id: Uuid) -> Result<Order, PlacementError> {
        let order = match self.engine.cancel_order(order_id) {
            Ok(order) => order,
            Err(EngineError::OrderNotFound(id)) => {
                return match self.orders.find_by_id(id)? {
                    Some(stored) if !stored.is_active() => {
                        Err(EngineError::OrderNotActive(id).into())
                    }
                    _ => Err(EngineError::OrderNotFound(id).into()),
                };
            }
            Err(e) => return Err(e.into()),
        };

        self.orders.update_status(order_id, OrderStatus::Cancelled)?;
        self.accounts
            .release_reservation(&order.account_id, order_id)?;
        self.publish(&order.market_id);
        Ok(order)
    }

    /// Active orders of an account, as persisted
    pub fn open_orders_for_account(&self, account_id: &str) -> Result<Vec<Order>, PlacementError> {
        Ok(self.orders.find_open_orders_for_account(account_id)?)
    }

    /// Persist this call's executions against both legs, one position per
    /// filled leg and, in explicit mode, the trade's funds movement.
    ///
    /// The incoming record is updated in place, never re-saved: once the order
    /// rests, other placements may already be recording fills against it.
    fn record_fills(&self, incoming: &Order, trades: &[Trade]) -> Result<(), RepositoryError> {
        self.orders.assign_sequence(incoming.id, incoming.sequence)?;

        let resting_side = incoming.side.opposite();
        for trade in trades {
            self.orders
                .reduce_remaining_quantity(incoming.id, trade.quantity)?;
            let resting = self
                .orders
                .reduce_remaining_quantity(trade.order_id(resting_side), trade.quantity)?;

            self.positions
                .save_position(incoming, trade.quantity, trade.price)?;
            self.positions
                .save_position(&resting, trade.quantity, trade.price)?;

            if self.config.bookkeeping == BookkeepingMode::Explicit {
                self.accounts
                    .transfer(&trade.buyer_id, &trade.seller_id, trade.value())?;
            }
            if !resting.is_active() {
                self.accounts
                    .release_reservation(&resting.account_id, resting.id)?;
            }

            tracing::debug!(
                trade = %trade.id,
                buyer = %trade.buyer_id,
                seller = %trade.seller_id,
                value = %trade.value(),
                "fill recorded"
            );
        }

        // Market remainder cancelled by the engine
        if incoming.status == OrderStatus::Cancelled {
            self.orders
                .update_status(incoming.id, OrderStatus::Cancelled)?;
        }
        if !incoming.is_active() {
            self.accounts
                .release_reservation(&incoming.account_id, incoming.id)?;
        }
        Ok(())
    }

    /// Compensate a persisted order whose matching failed
    fn reject_persisted(&self, order_id: Uuid, cause: &EngineError) {
        tracing::error!(order = %order_id, "matching failed after persist: {}", cause);
        if let Err(e) = self.orders.update_status(order_id, OrderStatus::Rejected) {
            tracing::error!(order = %order_id, "could not mark order rejected: {}", e);
        }
    }

    fn publish(&self, market_id: &str) {
        if let Some(feed) = &self.feed {
            feed.publish(&self.engine.snapshot(market_id));
        }
    }
}

fn summarize(order: &Order, trades: &[Trade]) -> String {
    match trades.len() {
        0 if order.is_market() && order.status == OrderStatus::Cancelled => {
            "market order cancelled (no liquidity)".to_string()
        }
        0 if order.is_market() => "market order placed (resting)".to_string(),
        0 => "no immediate trades".to_string(),
        n => format!("executed {} trades", n),
    }
}

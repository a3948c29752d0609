use dashmap::DashMap;
use rust_decimal::Decimal;
use std::cmp::Reverse;
use uuid::Uuid;

use crate::models::{Order, OrderSide, OrderStatus};

use super::error::RepositoryError;

/// Order persistence
pub trait OrderRepository: Send + Sync {
    /// Insert or replace an order record
    fn save(&self, order: &Order) -> Result<(), RepositoryError>;

    fn find_by_id(&self, order_id: Uuid) -> Result<Option<Order>, RepositoryError>;

    /// Active orders for one side of a market
    fn find_open_orders_for_market(
        &self,
        market_id: &str,
        side: OrderSide,
    ) -> Result<Vec<Order>, RepositoryError>;

    /// Active orders owned by an account, oldest first
    fn find_open_orders_for_account(&self, account_id: &str) -> Result<Vec<Order>, RepositoryError>;

    /// Record an execution against an order; returns the updated record
    fn reduce_remaining_quantity(
        &self,
        order_id: Uuid,
        executed: Decimal,
    ) -> Result<Order, RepositoryError>;

    /// Active orders on the side opposite to `side`, best price first, then oldest first
    fn find_opposite_side_orders(
        &self,
        market_id: &str,
        side: OrderSide,
    ) -> Result<Vec<Order>, RepositoryError>;

    fn update_status(&self, order_id: Uuid, status: OrderStatus) -> Result<(), RepositoryError>;

    /// Record the engine sequence of a persisted order, leaving fills and status untouched
    fn assign_sequence(&self, order_id: Uuid, sequence: u64) -> Result<(), RepositoryError>;
}

/// Sort orders of one side into price-time priority.
///
/// Market orders first, then best price (lowest ask, highest bid), then
/// submission sequence.
pub fn sort_price_time(orders: &mut [Order], side: OrderSide) {
    match side {
        OrderSide::Sell => {
            orders.sort_by_key(|o| (o.price.is_some(), o.price, o.sequence, o.timestamp))
        }
        OrderSide::Buy => orders
            .sort_by_key(|o| (o.price.is_some(), Reverse(o.price), o.sequence, o.timestamp)),
    }
}

/// In-memory order store
#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: DashMap<Uuid, Order>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    fn collect_active<F>(&self, filter: F) -> Vec<Order>
    where
        F: Fn(&Order) -> bool,
    {
        self.orders
            .iter()
            .filter(|entry| entry.is_active() && filter(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }
}

impl OrderRepository for InMemoryOrderRepository {
    fn save(&self, order: &Order) -> Result<(), RepositoryError> {
        self.orders.insert(order.id, order.clone());
        Ok(())
    }

    fn find_by_id(&self, order_id: Uuid) -> Result<Option<Order>, RepositoryError> {
        Ok(self.orders.get(&order_id).map(|o| o.value().clone()))
    }

    fn find_open_orders_for_market(
        &self,
        market_id: &str,
        side: OrderSide,
    ) -> Result<Vec<Order>, RepositoryError> {
        let mut orders = self.collect_active(|o| o.market_id == market_id && o.side == side);
        sort_price_time(&mut orders, side);
        Ok(orders)
    }

    fn find_open_orders_for_account(&self, account_id: &str) -> Result<Vec<Order>, RepositoryError> {
        let mut orders = self.collect_active(|o| o.account_id == account_id);
        orders.sort_by_key(|o| (o.sequence, o.timestamp));
        Ok(orders)
    }

    fn reduce_remaining_quantity(
        &self,
        order_id: Uuid,
        executed: Decimal,
    ) -> Result<Order, RepositoryError> {
        let mut entry = self
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("order {}", order_id)))?;

        if executed > entry.remaining_quantity() {
            return Err(RepositoryError::Conflict(format!(
                "order {} has {} remaining, cannot execute {}",
                order_id,
                entry.remaining_quantity(),
                executed
            )));
        }
        entry.fill(executed);
        Ok(entry.value().clone())
    }

    fn find_opposite_side_orders(
        &self,
        market_id: &str,
        side: OrderSide,
    ) -> Result<Vec<Order>, RepositoryError> {
        self.find_open_orders_for_market(market_id, side.opposite())
    }

    fn update_status(&self, order_id: Uuid, status: OrderStatus) -> Result<(), RepositoryError> {
        let mut entry = self
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("order {}", order_id)))?;
        entry.status = status;
        Ok(())
    }

    fn assign_sequence(&self, order_id: Uuid, sequence: u64) -> Result<(), RepositoryError> {
        let mut entry = self
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("order {}", order_id)))?;
        entry.sequence = sequence;
        Ok(())
    }
}

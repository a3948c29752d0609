//! Order validation functions
//!
//! Validation runs before any state change: a rejected order never reaches the
//! funds check, the repository or the book.

use rust_decimal::Decimal;

use crate::models::Order;

use super::errors::EngineError;

/// Validate that order quantity is positive
///
/// # Example
/// ```ignore
/// use rust_decimal_macros::dec;
/// assert!(validate_quantity(dec!(100)).is_ok());
/// assert!(validate_quantity(dec!(0)).is_err());
/// ```
pub fn validate_quantity(quantity: Decimal) -> Result<(), EngineError> {
    if quantity <= Decimal::ZERO {
        return Err(EngineError::InvalidQuantity(
            "quantity must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Validate an optional price. `None` is a market order and always valid.
pub fn validate_price(price: Option<Decimal>) -> Result<(), EngineError> {
    match price {
        Some(p) if p <= Decimal::ZERO => Err(EngineError::InvalidPrice(
            "price must be positive for limit orders".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Validate an order before processing; returns the first failure
pub fn validate_order(order: &Order) -> Result<(), EngineError> {
    validate_quantity(order.quantity)?;
    validate_price(order.price)?;
    Ok(())
}

//! Core configuration
//!
//! Every field has a default, so an empty JSON object or an empty environment
//! yields a usable configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// How balances move when a trade executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BookkeepingMode {
    /// Debit the buyer and credit the seller for every trade, atomically per trade
    #[default]
    Explicit,
    /// Net settlement is left to the capture-on-trade layer
    CaptureOnTrade,
}

/// What settlement does with positions whose account cannot be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SettlementMode {
    /// Fail the whole settlement before any balance moves
    #[default]
    Strict,
    /// Skip the position and report it in the summary
    Permissive,
}

/// Price used when two market orders meet
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "policy", content = "price")]
pub enum MarketCrossPolicy {
    /// Two market orders never trade with each other
    #[default]
    Reject,
    /// Trade at a fixed nominal price
    NominalPrice(Decimal),
}

/// What happens to the unfilled part of an incoming market order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MarketRemainderPolicy {
    #[default]
    Cancel,
    /// Keep it in the book as an always-crossing resting order
    Rest,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Invalid config document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Matching, placement and settlement settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Decimal places used to key order-book display levels
    #[serde(default = "default_price_precision")]
    pub price_precision: u32,

    /// Unit price used to estimate required funds for market orders
    #[serde(default = "default_market_order_unit_price")]
    pub market_order_unit_price: Decimal,

    /// Decimal places balances are rounded to when payouts are applied
    #[serde(default)]
    pub balance_scale: u32,

    #[serde(default)]
    pub bookkeeping: BookkeepingMode,

    #[serde(default)]
    pub settlement_mode: SettlementMode,

    #[serde(default)]
    pub market_cross: MarketCrossPolicy,

    #[serde(default)]
    pub market_remainder: MarketRemainderPolicy,

    /// Interval between order-book polls (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_price_precision() -> u32 {
    2
}

fn default_market_order_unit_price() -> Decimal {
    dec!(1.0)
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            price_precision: default_price_precision(),
            market_order_unit_price: default_market_order_unit_price(),
            balance_scale: 0,
            bookkeeping: BookkeepingMode::default(),
            settlement_mode: SettlementMode::default(),
            market_cross: MarketCrossPolicy::default(),
            market_remainder: MarketRemainderPolicy::default(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl CoreConfig {
    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from `MARKET_*` environment variables (a `.env` file is honored if present)
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("MARKET_PRICE_PRECISION") {
            config.price_precision = parse_value("MARKET_PRICE_PRECISION", &v)?;
        }
        if let Some(v) = lookup("MARKET_ORDER_UNIT_PRICE") {
            config.market_order_unit_price = parse_value("MARKET_ORDER_UNIT_PRICE", &v)?;
        }
        if let Some(v) = lookup("MARKET_BALANCE_SCALE") {
            config.balance_scale = parse_value("MARKET_BALANCE_SCALE", &v)?;
        }
        if let Some(v) = lookup("MARKET_POLL_INTERVAL_MS") {
            config.poll_interval_ms = parse_value("MARKET_POLL_INTERVAL_MS", &v)?;
        }
        if let Some(v) = lookup("MARKET_BOOKKEEPING") {
            config.bookkeeping = match v.as_str() {
                "explicit" => BookkeepingMode::Explicit,
                "capture_on_trade" => BookkeepingMode::CaptureOnTrade,
                _ => return Err(invalid("MARKET_BOOKKEEPING", &v)),
            };
        }
        if let Some(v) = lookup("MARKET_SETTLEMENT_MODE") {
            config.settlement_mode = match v.as_str() {
                "strict" => SettlementMode::Strict,
                "permissive" => SettlementMode::Permissive,
                _ => return Err(invalid("MARKET_SETTLEMENT_MODE", &v)),
            };
        }
        if let Some(v) = lookup("MARKET_REMAINDER") {
            config.market_remainder = match v.as_str() {
                "cancel" => MarketRemainderPolicy::Cancel,
                "rest" => MarketRemainderPolicy::Rest,
                _ => return Err(invalid("MARKET_REMAINDER", &v)),
            };
        }
        if let Some(v) = lookup("MARKET_CROSS_NOMINAL_PRICE") {
            config.market_cross =
                MarketCrossPolicy::NominalPrice(parse_value("MARKET_CROSS_NOMINAL_PRICE", &v)?);
        }

        Ok(config)
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| invalid(key, value))
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

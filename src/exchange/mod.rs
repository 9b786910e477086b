// Exchange client seam
pub mod normalize;
pub mod rest;

use async_trait::async_trait;
use serde_json::Value;

use crate::models::{Granularity, Side, StopDirection};

pub use normalize::parse_order_response;
pub use rest::RestExchangeClient;

/// Errors surfaced by an exchange client implementation
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// The requested resource does not exist (yet) - treated as transient
    /// by the kline pager, which retries once after a short delay.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("exchange API error: {code}: {message}")]
    Api { code: String, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Product metadata as reported by the exchange
#[derive(Debug, Clone, PartialEq)]
pub struct RawProduct {
    pub id: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub price: f64,
    pub base_min_size: f64,
    pub base_step: String,
    pub quote_min_size: f64,
    pub quote_step: String,
    pub trading_disabled: bool,
}

/// One asset balance as reported by the exchange
#[derive(Debug, Clone, PartialEq)]
pub struct RawBalance {
    pub asset: String,
    pub available: f64,
    pub hold: f64,
}

/// One candle as reported by the exchange (epoch seconds)
#[derive(Debug, Clone, PartialEq)]
pub struct RawCandle {
    pub start: i64,
    pub low: f64,
    pub high: f64,
    pub open: f64,
    pub close: f64,
    pub volume: f64,
}

/// Order shapes the exchange accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    Market,
    Limit,
    StopLimit,
}

/// Request parameters for placing one order
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub kind: OrderKind,
    pub symbol: String,
    pub side: Side,
    pub size: f64,
    pub price: Option<f64>,
    pub stop_price: Option<f64>,
    pub stop_direction: StopDirection,
}

impl OrderRequest {
    pub fn market(symbol: &str, side: Side, size: f64) -> Self {
        Self {
            kind: OrderKind::Market,
            symbol: symbol.to_string(),
            side,
            size,
            price: None,
            stop_price: None,
            stop_direction: StopDirection::None,
        }
    }

    pub fn limit(symbol: &str, side: Side, size: f64, price: f64) -> Self {
        Self {
            kind: OrderKind::Limit,
            symbol: symbol.to_string(),
            side,
            size,
            price: Some(price),
            stop_price: None,
            stop_direction: StopDirection::None,
        }
    }

    pub fn stop_limit(
        symbol: &str,
        side: Side,
        size: f64,
        price: f64,
        stop_price: f64,
        stop_direction: StopDirection,
    ) -> Self {
        Self {
            kind: OrderKind::StopLimit,
            symbol: symbol.to_string(),
            side,
            size,
            price: Some(price),
            stop_price: Some(stop_price),
            stop_direction,
        }
    }
}

/// Narrow interface to a trading venue
///
/// The account core only ever talks to the exchange through this trait, so
/// live backends and test doubles are interchangeable at construction time.
/// Order calls return raw JSON: response shapes overlap only partially per
/// call site and are interpreted by [`parse_order_response`].
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    async fn list_products(&self) -> Result<Vec<RawProduct>, ExchangeError>;

    async fn get_price(&self, symbol: &str) -> Result<f64, ExchangeError>;

    async fn list_balances(&self) -> Result<Vec<RawBalance>, ExchangeError>;

    async fn place_order(&self, request: &OrderRequest) -> Result<Value, ExchangeError>;

    async fn cancel_order(&self, order_id: &str) -> Result<Value, ExchangeError>;

    async fn get_order(&self, order_id: &str) -> Result<Value, ExchangeError>;

    async fn get_candles(
        &self,
        symbol: &str,
        start: i64,
        end: i64,
        granularity: Granularity,
    ) -> Result<Vec<RawCandle>, ExchangeError>;
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Balance for a single asset
///
/// Invariant: `total == available + hold`, all three non-negative.
/// Assets with a zero total are never stored - absence means zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub total: f64,
    pub available: f64,
    pub hold: f64,
}

impl AssetBalance {
    pub fn new(total: f64, available: f64, hold: f64) -> Self {
        Self {
            total,
            available,
            hold,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.total == 0.0 && self.available == 0.0 && self.hold == 0.0
    }
}

/// OHLCV candlestick data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kline {
    pub timestamp: DateTime<Utc>,
    pub low: f64,
    pub high: f64,
    pub open: f64,
    pub close: f64,
    pub volume: f64,
}

/// Candle bucket widths supported by the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Granularity {
    OneMinute,
    FiveMinute,
    FifteenMinute,
    ThirtyMinute,
    OneHour,
    TwoHour,
    SixHour,
    OneDay,
}

impl Granularity {
    /// Bucket width in seconds
    pub fn as_secs(&self) -> i64 {
        match self {
            Granularity::OneMinute => 60,
            Granularity::FiveMinute => 300,
            Granularity::FifteenMinute => 900,
            Granularity::ThirtyMinute => 1800,
            Granularity::OneHour => 3600,
            Granularity::TwoHour => 7200,
            Granularity::SixHour => 21600,
            Granularity::OneDay => 86400,
        }
    }

    /// Wire label understood by the exchange
    pub fn label(&self) -> &'static str {
        match self {
            Granularity::OneMinute => "ONE_MINUTE",
            Granularity::FiveMinute => "FIVE_MINUTE",
            Granularity::FifteenMinute => "FIFTEEN_MINUTE",
            Granularity::ThirtyMinute => "THIRTY_MINUTE",
            Granularity::OneHour => "ONE_HOUR",
            Granularity::TwoHour => "TWO_HOUR",
            Granularity::SixHour => "SIX_HOUR",
            Granularity::OneDay => "ONE_DAY",
        }
    }

    pub fn from_secs(secs: i64) -> Option<Self> {
        match secs {
            60 => Some(Granularity::OneMinute),
            300 => Some(Granularity::FiveMinute),
            900 => Some(Granularity::FifteenMinute),
            1800 => Some(Granularity::ThirtyMinute),
            3600 => Some(Granularity::OneHour),
            7200 => Some(Granularity::TwoHour),
            21600 => Some(Granularity::SixHour),
            86400 => Some(Granularity::OneDay),
            _ => None,
        }
    }
}

/// Static metadata for one tradeable symbol pair
///
/// Immutable once loaded; refreshed only by an explicit reload of the
/// exchange metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub base: String,
    pub currency: String,
    pub min_qty: f64,
    pub min_price: f64,
    /// Step sizes as reported by the exchange, e.g. "0.00000001"
    pub base_step_size: String,
    pub currency_step_size: String,
    /// Decimal precision derived from the step sizes
    pub base_precision: u32,
    pub currency_precision: u32,
    pub is_currency_pair: bool,
    pub order_types: Vec<String>,
    pub trading_disabled: bool,
}

impl SymbolInfo {
    /// Symbol in the exchange's BASE-QUOTE form
    pub fn symbol(&self) -> String {
        format!("{}-{}", self.base, self.currency)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
    Unknown,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    StopLoss,
    StopLossLimit,
    TakeProfit,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    New,
    Placed,
    PartiallyFilled,
    Filled,
    Cancelled,
    PendingCancel,
    Rejected,
    Expired,
    Error,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopDirection {
    Above,
    Below,
    None,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    GoodUntilCancelled,
    ImmediateOrCancel,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderErrorReason {
    None,
    Unknown,
    InvalidSymbol,
    InsufficientBalance,
    InvalidPrice,
    InvalidSize,
}

/// Canonical view of one exchange order response
///
/// Built once by the normalizer and never mutated afterwards; a status
/// change is observed by re-querying the order and building a fresh result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    pub id: String,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub limit_price: f64,
    pub stop_price: f64,
    pub stop_direction: StopDirection,
    pub size: f64,
    pub filled_size: f64,
    pub fee: f64,
    pub price: f64,
    pub time_in_force: TimeInForce,
    pub placed_at: Option<DateTime<Utc>>,
    pub filled_at: Option<DateTime<Utc>>,
    pub error_reason: OrderErrorReason,
    pub error_msg: String,
}

impl Default for OrderResult {
    fn default() -> Self {
        Self {
            id: String::new(),
            symbol: String::new(),
            side: Side::None,
            order_type: OrderType::Unknown,
            status: OrderStatus::Unknown,
            limit_price: 0.0,
            stop_price: 0.0,
            stop_direction: StopDirection::None,
            size: 0.0,
            filled_size: 0.0,
            fee: 0.0,
            price: 0.0,
            time_in_force: TimeInForce::Unknown,
            placed_at: None,
            filled_at: None,
            error_reason: OrderErrorReason::None,
            error_msg: String::new(),
        }
    }
}

impl OrderResult {
    pub fn is_rejected(&self) -> bool {
        self.status == OrderStatus::Rejected || self.status == OrderStatus::Error
    }
}

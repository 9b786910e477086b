use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::models::{
    OrderErrorReason, OrderResult, OrderStatus, OrderType, Side, StopDirection, TimeInForce,
};

/// Parse one raw order response into a canonical [`OrderResult`]
///
/// Handles every shape the exchange produces: error envelopes, single-order
/// placement payloads, multi-result batch payloads, and get-order payloads.
/// Error detection runs first so no field access happens on a payload shape
/// that would not contain those fields.
pub fn parse_order_response(raw: &Value) -> OrderResult {
    if let Some(rejected) = parse_error_envelope(raw) {
        return rejected;
    }

    let mut result = OrderResult::default();

    let payload = match locate_order_payload(raw) {
        Some(p) => p,
        None => return result,
    };

    result.id = str_field(payload, "order_id").unwrap_or_default();
    result.symbol = str_field(payload, "product_id").unwrap_or_default();

    result.side = match str_field(payload, "side").as_deref() {
        Some("BUY") => Side::Buy,
        Some("SELL") => Side::Sell,
        Some(_) => Side::Unknown,
        None => Side::None,
    };

    result.placed_at = time_field(payload, "created_time");
    result.filled_at = time_field(payload, "last_fill_time");
    result.filled_size = num_field(payload, "filled_size").unwrap_or(0.0);
    result.fee = num_field(payload, "total_fees").unwrap_or(0.0);

    result.time_in_force = match str_field(payload, "time_in_force").as_deref() {
        Some("GOOD_UNTIL_CANCELLED") => TimeInForce::GoodUntilCancelled,
        Some("IMMEDIATE_OR_CANCEL") => TimeInForce::ImmediateOrCancel,
        _ => TimeInForce::Unknown,
    };

    // Prefer the average fill price; fall back to the filled notional value
    result.price = match num_field(payload, "average_filled_price") {
        Some(p) if p > 0.0 => p,
        _ => num_field(payload, "filled_value").unwrap_or(0.0),
    };

    // Order placement acknowledges before any status field exists
    result.status = OrderStatus::Placed;

    parse_order_configuration(raw, payload, &mut result);
    parse_status(payload, &mut result);

    result
}

/// Detect a `success == false` envelope and map it to a rejection
fn parse_error_envelope(raw: &Value) -> Option<OrderResult> {
    if raw.get("success")?.as_bool()? {
        return None;
    }

    let body = raw
        .get("response")
        .or_else(|| raw.get("error_response"))
        .unwrap_or(&Value::Null);

    let code = str_field(body, "error").unwrap_or_default();
    let error_reason = match code.as_str() {
        "INSUFFICIENT_FUND" => OrderErrorReason::InsufficientBalance,
        "UNKNOWN_PRODUCT" | "PRODUCT_NOT_FOUND" => OrderErrorReason::InvalidSymbol,
        "INVALID_PRICE_PRECISION" | "INVALID_LIMIT_PRICE" => OrderErrorReason::InvalidPrice,
        "INVALID_SIZE_PRECISION" | "INVALID_ORDER_SIZE" => OrderErrorReason::InvalidSize,
        _ => OrderErrorReason::Unknown,
    };

    Some(OrderResult {
        status: OrderStatus::Rejected,
        error_reason,
        error_msg: str_field(body, "message").unwrap_or_default(),
        ..OrderResult::default()
    })
}

/// Locate the order sub-payload within the response
///
/// Placement responses carry a singular `success_response`, batch responses a
/// `results` array, get-order responses a bare `order` field. Batches with
/// more than one element are not supported; only the first is interpreted.
fn locate_order_payload(raw: &Value) -> Option<&Value> {
    if let Some(single) = raw.get("success_response") {
        return Some(single);
    }

    if let Some(results) = raw.get("results").and_then(Value::as_array) {
        if results.len() > 1 {
            tracing::warn!(
                count = results.len(),
                "multi-order batch response; interpreting only the first result"
            );
        }
        return results.first();
    }

    raw.get("order")
}

/// Derive the order type from the configuration variant present
///
/// Exactly one of the three variants appears in a well-formed payload; none
/// present leaves the type Unknown with no size/price fields populated.
/// Placement responses carry the configuration as a sibling of the
/// sub-payload, get-order responses nest it inside the order.
fn parse_order_configuration(raw: &Value, payload: &Value, result: &mut OrderResult) {
    let config = match payload
        .get("order_configuration")
        .or_else(|| raw.get("order_configuration"))
    {
        Some(c) => c,
        None => return,
    };

    if let Some(market) = config.get("market_market_ioc") {
        result.order_type = OrderType::Market;
        result.size = num_field(market, "base_size")
            .or_else(|| num_field(market, "quote_size"))
            .unwrap_or(0.0);
    } else if let Some(limit) = config.get("limit_limit_gtc") {
        result.order_type = OrderType::Limit;
        result.size = num_field(limit, "base_size").unwrap_or(0.0);
        result.limit_price = num_field(limit, "limit_price").unwrap_or(0.0);
    } else if let Some(stop) = config.get("stop_limit_stop_limit_gtc") {
        result.order_type = OrderType::StopLossLimit;
        result.size = num_field(stop, "base_size").unwrap_or(0.0);
        result.limit_price = num_field(stop, "limit_price").unwrap_or(0.0);
        result.stop_price = num_field(stop, "stop_price").unwrap_or(0.0);
        result.stop_direction = match str_field(stop, "stop_direction").as_deref() {
            Some("STOP_DIRECTION_STOP_UP") => StopDirection::Above,
            Some("STOP_DIRECTION_STOP_DOWN") => StopDirection::Below,
            Some(_) => StopDirection::Unknown,
            None => StopDirection::None,
        };
    }
}

/// Final status, overriding the provisional Placed
fn parse_status(payload: &Value, result: &mut OrderResult) {
    match str_field(payload, "status").as_deref() {
        Some("FILLED") => result.status = OrderStatus::Filled,
        Some("CANCELLED") | Some("CANCEL_QUEUED") => result.status = OrderStatus::Cancelled,
        Some("EXPIRED") => result.status = OrderStatus::Expired,
        Some("PENDING") => result.status = OrderStatus::New,
        Some("OPEN") => result.status = OrderStatus::Placed,
        _ => {}
    }

    // Cancel-queued can also surface as a flag on an otherwise open order
    if payload
        .get("pending_cancel")
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        result.status = OrderStatus::Cancelled;
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key)?.as_str().map(str::to_string)
}

/// Numeric field that may arrive as a JSON number or a decimal string
fn num_field(value: &Value, key: &str) -> Option<f64> {
    let field = value.get(key)?;
    match field {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// RFC 3339 timestamp field; absent or unparseable stays unset
fn time_field(value: &Value, key: &str) -> Option<DateTime<Utc>> {
    let text = value.get(key)?.as_str()?;
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

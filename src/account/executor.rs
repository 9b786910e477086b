use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use crate::account::info::ExchangeInfo;
use crate::account::ledger::BalanceLedger;
use crate::exchange::{parse_order_response, ExchangeClient, OrderKind, OrderRequest};
use crate::market::MarketCache;
use crate::models::{OrderResult, OrderStatus};
use crate::Result;

/// Result of routing one order through an executor
///
/// Simulation synthesizes a success flag from the ledger; live execution
/// always yields a normalized [`OrderResult`], rejected or otherwise.
#[derive(Debug, Clone)]
pub enum OrderOutcome {
    Simulated { accepted: bool },
    Placed(OrderResult),
}

impl OrderOutcome {
    pub fn is_accepted(&self) -> bool {
        match self {
            OrderOutcome::Simulated { accepted } => *accepted,
            OrderOutcome::Placed(result) => !result.is_rejected(),
        }
    }
}

/// Order routing strategy, fixed when the account is constructed
#[async_trait]
pub trait OrderExecutor: Send + Sync {
    async fn execute(&self, request: &OrderRequest) -> Result<OrderOutcome>;

    async fn cancel(&self, order_id: &str) -> Result<OrderResult>;

    async fn lookup(&self, order_id: &str) -> Result<OrderResult>;
}

/// Paper-trading execution: fills orders instantly against the ledger
pub struct SimulatedExecutor {
    ledger: Arc<Mutex<BalanceLedger>>,
    cache: Arc<MarketCache>,
    info: Arc<ExchangeInfo>,
    fee_rate: f64,
}

impl SimulatedExecutor {
    pub fn new(
        ledger: Arc<Mutex<BalanceLedger>>,
        cache: Arc<MarketCache>,
        info: Arc<ExchangeInfo>,
        fee_rate: f64,
    ) -> Self {
        Self {
            ledger,
            cache,
            info,
            fee_rate,
        }
    }
}

#[async_trait]
impl OrderExecutor for SimulatedExecutor {
    async fn execute(&self, request: &OrderRequest) -> Result<OrderOutcome> {
        let symbol = match self.info.get(&request.symbol) {
            Some(s) => s.clone(),
            None => {
                tracing::warn!(symbol = %request.symbol, "rejecting order for unknown symbol");
                return Ok(OrderOutcome::Simulated { accepted: false });
            }
        };

        // Market orders fill at the cached ticker price; the zero sentinel
        // for an unknown price is a rejection, not a fault. Limit and
        // stop-limit orders fill at their limit price.
        let price = match request.kind {
            OrderKind::Market => self.cache.get_price(&request.symbol),
            OrderKind::Limit | OrderKind::StopLimit => request.price.unwrap_or(0.0),
        };
        if price <= 0.0 {
            tracing::warn!(symbol = %request.symbol, "rejecting order with no usable price");
            return Ok(OrderOutcome::Simulated { accepted: false });
        }

        let accepted = self.ledger.lock().unwrap().apply_fill(
            request.side,
            &symbol.base,
            &symbol.currency,
            request.size,
            price,
            self.fee_rate,
            &symbol.base_step_size,
            &symbol.currency_step_size,
        );

        tracing::info!(
            order_id = %Uuid::new_v4(),
            symbol = %request.symbol,
            side = ?request.side,
            kind = ?request.kind,
            size = request.size,
            price,
            accepted,
            "simulated order"
        );

        Ok(OrderOutcome::Simulated { accepted })
    }

    async fn cancel(&self, order_id: &str) -> Result<OrderResult> {
        // Simulated fills complete instantly; there is never an open order
        tracing::debug!(order_id, "cancel requested in simulation");
        Ok(OrderResult {
            id: order_id.to_string(),
            status: OrderStatus::Unknown,
            error_msg: "no open orders in simulation".to_string(),
            ..OrderResult::default()
        })
    }

    async fn lookup(&self, order_id: &str) -> Result<OrderResult> {
        Ok(OrderResult {
            id: order_id.to_string(),
            status: OrderStatus::Unknown,
            error_msg: "no open orders in simulation".to_string(),
            ..OrderResult::default()
        })
    }
}

/// Live execution: delegates to the exchange client and normalizes results
///
/// Transport faults are wrapped into the error-envelope shape and routed
/// through the normalizer, so callers always see an [`OrderResult`], never a
/// raw fault.
pub struct LiveExecutor {
    client: Arc<dyn ExchangeClient>,
}

impl LiveExecutor {
    pub fn new(client: Arc<dyn ExchangeClient>) -> Self {
        Self { client }
    }

    fn fault_envelope(message: String) -> serde_json::Value {
        json!({
            "success": false,
            "response": {"error": "TRANSPORT_FAULT", "message": message}
        })
    }
}

#[async_trait]
impl OrderExecutor for LiveExecutor {
    async fn execute(&self, request: &OrderRequest) -> Result<OrderOutcome> {
        let raw = match self.client.place_order(request).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(symbol = %request.symbol, error = %e, "order placement failed");
                Self::fault_envelope(e.to_string())
            }
        };

        Ok(OrderOutcome::Placed(parse_order_response(&raw)))
    }

    async fn cancel(&self, order_id: &str) -> Result<OrderResult> {
        let raw = match self.client.cancel_order(order_id).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(order_id, error = %e, "order cancel failed");
                Self::fault_envelope(e.to_string())
            }
        };

        Ok(parse_order_response(&raw))
    }

    async fn lookup(&self, order_id: &str) -> Result<OrderResult> {
        let raw = match self.client.get_order(order_id).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(order_id, error = %e, "order lookup failed");
                Self::fault_envelope(e.to_string())
            }
        };

        Ok(parse_order_response(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{ExchangeError, RawBalance, RawCandle, RawProduct};
    use crate::models::{Granularity, OrderErrorReason, Side, StopDirection};
    use chrono::Utc;
    use serde_json::Value;

    fn test_info() -> Arc<ExchangeInfo> {
        Arc::new(ExchangeInfo::from_products(vec![RawProduct {
            id: "BTC-USD".to_string(),
            base_asset: "BTC".to_string(),
            quote_asset: "USD".to_string(),
            price: 50000.0,
            base_min_size: 0.0001,
            base_step: "0.00000001".to_string(),
            quote_min_size: 1.0,
            quote_step: "0.01".to_string(),
            trading_disabled: false,
        }]))
    }

    fn simulated(usd: f64) -> (SimulatedExecutor, Arc<Mutex<BalanceLedger>>, Arc<MarketCache>) {
        let mut ledger = BalanceLedger::new();
        ledger.update_balance("USD", usd, usd, 0.0);
        let ledger = Arc::new(Mutex::new(ledger));
        let cache = Arc::new(MarketCache::new(vec!["USD".to_string()]));
        let executor = SimulatedExecutor::new(ledger.clone(), cache.clone(), test_info(), 0.0);
        (executor, ledger, cache)
    }

    #[tokio::test]
    async fn test_simulated_market_buy_fills_against_ledger() {
        let (executor, ledger, cache) = simulated(60000.0);
        cache.update_price("BTC-USD", 50000.0, Utc::now());

        let outcome = executor
            .execute(&OrderRequest::market("BTC-USD", Side::Buy, 1.0))
            .await
            .unwrap();

        assert!(outcome.is_accepted());
        let ledger = ledger.lock().unwrap();
        assert_eq!(ledger.get_balance("BTC").total, 1.0);
        assert_eq!(ledger.get_balance("USD").available, 10000.0);
    }

    #[tokio::test]
    async fn test_simulated_market_order_needs_cached_price() {
        let (executor, ledger, _cache) = simulated(60000.0);

        // No ticker update: price sentinel is 0.0, order rejected
        let outcome = executor
            .execute(&OrderRequest::market("BTC-USD", Side::Buy, 1.0))
            .await
            .unwrap();

        assert!(!outcome.is_accepted());
        assert!(!ledger.lock().unwrap().has_asset("BTC"));
    }

    #[tokio::test]
    async fn test_simulated_limit_fills_at_limit_price() {
        let (executor, ledger, _cache) = simulated(10000.0);

        let outcome = executor
            .execute(&OrderRequest::limit("BTC-USD", Side::Buy, 0.2, 40000.0))
            .await
            .unwrap();

        assert!(outcome.is_accepted());
        assert_eq!(ledger.lock().unwrap().get_balance("USD").total, 2000.0);
        assert_eq!(ledger.lock().unwrap().get_balance("BTC").total, 0.2);
    }

    #[tokio::test]
    async fn test_simulated_stop_limit_sell() {
        let (executor, ledger, _cache) = simulated(0.0);
        ledger.lock().unwrap().update_balance("BTC", 1.0, 1.0, 0.0);

        let outcome = executor
            .execute(&OrderRequest::stop_limit(
                "BTC-USD",
                Side::Sell,
                0.5,
                48000.0,
                49000.0,
                StopDirection::Below,
            ))
            .await
            .unwrap();

        assert!(outcome.is_accepted());
        assert_eq!(ledger.lock().unwrap().get_balance("BTC").total, 0.5);
        assert_eq!(ledger.lock().unwrap().get_balance("USD").total, 24000.0);
    }

    #[tokio::test]
    async fn test_simulated_unknown_symbol_rejected() {
        let (executor, _ledger, cache) = simulated(60000.0);
        cache.update_price("DOGE-USD", 0.1, Utc::now());

        let outcome = executor
            .execute(&OrderRequest::market("DOGE-USD", Side::Buy, 100.0))
            .await
            .unwrap();

        assert!(!outcome.is_accepted());
    }

    #[tokio::test]
    async fn test_simulated_cancel_has_nothing_to_do() {
        let (executor, _ledger, _cache) = simulated(0.0);
        let result = executor.cancel("some-id").await.unwrap();

        assert_eq!(result.id, "some-id");
        assert_eq!(result.status, OrderStatus::Unknown);
    }

    /// Client whose every call fails at the transport layer
    struct BrokenExchange;

    #[async_trait]
    impl ExchangeClient for BrokenExchange {
        async fn list_products(&self) -> std::result::Result<Vec<RawProduct>, ExchangeError> {
            Err(ExchangeError::Malformed("down".to_string()))
        }

        async fn get_price(&self, _symbol: &str) -> std::result::Result<f64, ExchangeError> {
            Err(ExchangeError::Malformed("down".to_string()))
        }

        async fn list_balances(&self) -> std::result::Result<Vec<RawBalance>, ExchangeError> {
            Err(ExchangeError::Malformed("down".to_string()))
        }

        async fn place_order(
            &self,
            _request: &OrderRequest,
        ) -> std::result::Result<Value, ExchangeError> {
            Err(ExchangeError::Malformed("connection reset".to_string()))
        }

        async fn cancel_order(&self, _id: &str) -> std::result::Result<Value, ExchangeError> {
            Err(ExchangeError::Malformed("connection reset".to_string()))
        }

        async fn get_order(&self, _id: &str) -> std::result::Result<Value, ExchangeError> {
            Err(ExchangeError::Malformed("connection reset".to_string()))
        }

        async fn get_candles(
            &self,
            _symbol: &str,
            _start: i64,
            _end: i64,
            _granularity: Granularity,
        ) -> std::result::Result<Vec<RawCandle>, ExchangeError> {
            Err(ExchangeError::Malformed("down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_live_transport_fault_becomes_rejected_result() {
        let executor = LiveExecutor::new(Arc::new(BrokenExchange));

        let outcome = executor
            .execute(&OrderRequest::market("BTC-USD", Side::Buy, 1.0))
            .await
            .unwrap();

        assert!(!outcome.is_accepted());
        match outcome {
            OrderOutcome::Placed(result) => {
                assert_eq!(result.status, OrderStatus::Rejected);
                assert_eq!(result.error_reason, OrderErrorReason::Unknown);
                assert!(result.error_msg.contains("connection reset"));
            }
            OrderOutcome::Simulated { .. } => panic!("live executor must return an OrderResult"),
        }
    }

    #[tokio::test]
    async fn test_live_cancel_fault_is_normalized() {
        let executor = LiveExecutor::new(Arc::new(BrokenExchange));
        let result = executor.cancel("o-1").await.unwrap();

        assert_eq!(result.status, OrderStatus::Rejected);
        assert_eq!(result.error_reason, OrderErrorReason::Unknown);
    }
}

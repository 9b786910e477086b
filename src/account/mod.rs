// Account abstraction: ledger, metadata, execution, facade
pub mod executor;
pub mod info;
pub mod ledger;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::exchange::{ExchangeClient, OrderRequest};
use crate::market::MarketCache;
use crate::models::{AssetBalance, Granularity, Kline, OrderResult, Side, StopDirection};
use crate::Result;

pub use executor::{LiveExecutor, OrderExecutor, OrderOutcome, SimulatedExecutor};
pub use info::ExchangeInfo;
pub use ledger::BalanceLedger;

/// Whether orders fill against the simulated ledger or the live venue
///
/// Read once at construction; simulation and live paths are separate
/// executor strategies, not per-call flag checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Simulated,
    Live,
}

/// The account contract strategy code consumes
///
/// Implemented per exchange backend; all backends expose the same operation
/// set, selected at construction rather than through inheritance chains.
#[async_trait]
pub trait Account: Send + Sync {
    fn mode(&self) -> ExecutionMode;

    fn get_balance(&self, asset: &str) -> AssetBalance;

    fn get_all_balances(&self) -> HashMap<String, f64>;

    fn get_all_balances_detailed(&self) -> HashMap<String, AssetBalance>;

    /// Overwrite one balance triple; simulation only
    fn update_balance(&self, asset: &str, total: f64, available: f64, hold: f64);

    fn get_price(&self, symbol: &str) -> f64;

    fn update_price(&self, symbol: &str, price: f64, ts: DateTime<Utc>);

    /// Account equity in `target` currency
    fn total_value(&self, target: &str) -> f64;

    fn exchange_info(&self) -> &ExchangeInfo;

    /// Re-sync balances from the venue (live); no-op in simulation
    async fn refresh_balances(&self) -> Result<()>;

    async fn market_buy(&self, symbol: &str, size: f64) -> Result<OrderOutcome>;

    async fn market_sell(&self, symbol: &str, size: f64) -> Result<OrderOutcome>;

    async fn limit_buy(&self, symbol: &str, size: f64, price: f64) -> Result<OrderOutcome>;

    async fn limit_sell(&self, symbol: &str, size: f64, price: f64) -> Result<OrderOutcome>;

    async fn stop_limit_buy(
        &self,
        symbol: &str,
        size: f64,
        price: f64,
        stop_price: f64,
        stop_direction: StopDirection,
    ) -> Result<OrderOutcome>;

    async fn stop_limit_sell(
        &self,
        symbol: &str,
        size: f64,
        price: f64,
        stop_price: f64,
        stop_direction: StopDirection,
    ) -> Result<OrderOutcome>;

    async fn cancel_order(&self, order_id: &str) -> Result<OrderResult>;

    async fn get_order(&self, order_id: &str) -> Result<OrderResult>;

    async fn get_klines_range(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: Granularity,
    ) -> Result<Vec<Kline>>;
}

/// One exchange account: ledger + market cache + metadata + executor
pub struct TradingAccount {
    mode: ExecutionMode,
    client: Arc<dyn ExchangeClient>,
    ledger: Arc<Mutex<BalanceLedger>>,
    cache: Arc<MarketCache>,
    info: Arc<ExchangeInfo>,
    executor: Box<dyn OrderExecutor>,
}

impl TradingAccount {
    /// Assemble an account; the executor strategy is fixed here by `mode`
    pub fn new(
        mode: ExecutionMode,
        client: Arc<dyn ExchangeClient>,
        info: ExchangeInfo,
        stable_currencies: Vec<String>,
        fee_rate: f64,
    ) -> Self {
        let ledger = Arc::new(Mutex::new(BalanceLedger::new()));
        let cache = Arc::new(MarketCache::new(stable_currencies));
        let info = Arc::new(info);

        let executor: Box<dyn OrderExecutor> = match mode {
            ExecutionMode::Simulated => Box::new(SimulatedExecutor::new(
                ledger.clone(),
                cache.clone(),
                info.clone(),
                fee_rate,
            )),
            ExecutionMode::Live => Box::new(LiveExecutor::new(client.clone())),
        };

        Self {
            mode,
            client,
            ledger,
            cache,
            info,
            executor,
        }
    }

    pub fn market_cache(&self) -> &MarketCache {
        &self.cache
    }
}

#[async_trait]
impl Account for TradingAccount {
    fn mode(&self) -> ExecutionMode {
        self.mode
    }

    fn get_balance(&self, asset: &str) -> AssetBalance {
        self.ledger.lock().unwrap().get_balance(asset)
    }

    fn get_all_balances(&self) -> HashMap<String, f64> {
        self.ledger.lock().unwrap().get_all_balances()
    }

    fn get_all_balances_detailed(&self) -> HashMap<String, AssetBalance> {
        self.ledger.lock().unwrap().get_all_balances_detailed()
    }

    fn update_balance(&self, asset: &str, total: f64, available: f64, hold: f64) {
        if self.mode == ExecutionMode::Live {
            tracing::warn!(
                asset,
                "ignoring incremental balance write in live mode; use refresh_balances"
            );
            return;
        }
        self.ledger
            .lock()
            .unwrap()
            .update_balance(asset, total, available, hold);
    }

    fn get_price(&self, symbol: &str) -> f64 {
        self.cache.get_price(symbol)
    }

    fn update_price(&self, symbol: &str, price: f64, ts: DateTime<Utc>) {
        self.cache.update_price(symbol, price, ts);
    }

    fn total_value(&self, target: &str) -> f64 {
        let balances = self.ledger.lock().unwrap().get_all_balances();
        // Simulation must not silently under-report equity on a missing price
        let strict = self.mode == ExecutionMode::Simulated;
        self.cache.total_value(&balances, target, strict)
    }

    fn exchange_info(&self) -> &ExchangeInfo {
        &self.info
    }

    async fn refresh_balances(&self) -> Result<()> {
        if self.mode == ExecutionMode::Simulated {
            tracing::debug!("refresh_balances is a no-op in simulation");
            return Ok(());
        }

        let raw = self.client.list_balances().await?;
        let balances: HashMap<String, AssetBalance> = raw
            .into_iter()
            .map(|b| {
                (
                    b.asset,
                    AssetBalance::new(b.available + b.hold, b.available, b.hold),
                )
            })
            .collect();

        let count = balances.len();
        self.ledger.lock().unwrap().replace_all(balances);
        tracing::info!(count, "refreshed balances from exchange");
        Ok(())
    }

    async fn market_buy(&self, symbol: &str, size: f64) -> Result<OrderOutcome> {
        self.executor
            .execute(&OrderRequest::market(symbol, Side::Buy, size))
            .await
    }

    async fn market_sell(&self, symbol: &str, size: f64) -> Result<OrderOutcome> {
        self.executor
            .execute(&OrderRequest::market(symbol, Side::Sell, size))
            .await
    }

    async fn limit_buy(&self, symbol: &str, size: f64, price: f64) -> Result<OrderOutcome> {
        self.executor
            .execute(&OrderRequest::limit(symbol, Side::Buy, size, price))
            .await
    }

    async fn limit_sell(&self, symbol: &str, size: f64, price: f64) -> Result<OrderOutcome> {
        self.executor
            .execute(&OrderRequest::limit(symbol, Side::Sell, size, price))
            .await
    }

    async fn stop_limit_buy(
        &self,
        symbol: &str,
        size: f64,
        price: f64,
        stop_price: f64,
        stop_direction: StopDirection,
    ) -> Result<OrderOutcome> {
        self.executor
            .execute(&OrderRequest::stop_limit(
                symbol,
                Side::Buy,
                size,
                price,
                stop_price,
                stop_direction,
            ))
            .await
    }

    async fn stop_limit_sell(
        &self,
        symbol: &str,
        size: f64,
        price: f64,
        stop_price: f64,
        stop_direction: StopDirection,
    ) -> Result<OrderOutcome> {
        self.executor
            .execute(&OrderRequest::stop_limit(
                symbol,
                Side::Sell,
                size,
                price,
                stop_price,
                stop_direction,
            ))
            .await
    }

    async fn cancel_order(&self, order_id: &str) -> Result<OrderResult> {
        self.executor.cancel(order_id).await
    }

    async fn get_order(&self, order_id: &str) -> Result<OrderResult> {
        self.executor.lookup(order_id).await
    }

    async fn get_klines_range(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: Granularity,
    ) -> Result<Vec<Kline>> {
        self.cache
            .get_klines_range(self.client.as_ref(), symbol, start, end, granularity)
            .await
    }
}

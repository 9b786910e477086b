use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use tokio::time::{sleep, Duration};

use crate::exchange::{ExchangeClient, ExchangeError};
use crate::models::{Granularity, Kline};
use crate::Result;

/// Maximum candles the exchange serves per request
const MAX_CANDLES_PER_REQUEST: i64 = 300;
/// Courtesy pause between successive kline pages
const PAGE_DELAY_MS: u64 = 250;
/// Pause before retrying a page that came back not-found
const RETRY_DELAY_MS: u64 = 500;
const MAX_PAGE_ATTEMPTS: u32 = 3;

/// Cached ticker state for one symbol
///
/// Min/max are running extrema over every observed price, not a sliding
/// window; they reset only on a full cache reset.
#[derive(Debug, Clone, Copy)]
struct TickerStats {
    price: f64,
    ts: DateTime<Utc>,
    min: (f64, DateTime<Utc>),
    max: (f64, DateTime<Utc>),
}

/// In-memory ticker price cache with running extrema and kline retrieval
///
/// One mutex serializes all price/extrema access so an async feed update and
/// a read-then-value computation never observe torn min/max pairs.
pub struct MarketCache {
    tickers: Mutex<HashMap<String, TickerStats>>,
    stable_currencies: Vec<String>,
}

impl MarketCache {
    /// The stable-currency set is treated as 1:1-equivalent during valuation
    pub fn new(stable_currencies: Vec<String>) -> Self {
        Self {
            tickers: Mutex::new(HashMap::new()),
            stable_currencies,
        }
    }

    /// Cached price, or 0.0 when unknown - the zero sentinel; never fails.
    /// Callers dividing by a price must guard against the sentinel.
    pub fn get_price(&self, symbol: &str) -> f64 {
        let tickers = self.tickers.lock().unwrap();
        tickers.get(symbol).map(|t| t.price).unwrap_or(0.0)
    }

    /// Record a ticker update and maintain the running extrema
    ///
    /// The first observation seeds min and max; afterwards an update can
    /// replace at most one of the two.
    pub fn update_price(&self, symbol: &str, price: f64, ts: DateTime<Utc>) {
        let mut tickers = self.tickers.lock().unwrap();

        match tickers.get_mut(symbol) {
            Some(stats) => {
                stats.price = price;
                stats.ts = ts;
                if price < stats.min.0 {
                    stats.min = (price, ts);
                } else if price > stats.max.0 {
                    stats.max = (price, ts);
                }
            }
            None => {
                tickers.insert(
                    symbol.to_string(),
                    TickerStats {
                        price,
                        ts,
                        min: (price, ts),
                        max: (price, ts),
                    },
                );
            }
        }
    }

    /// Lowest observed price and when it was seen
    pub fn min_price(&self, symbol: &str) -> Option<(f64, DateTime<Utc>)> {
        let tickers = self.tickers.lock().unwrap();
        tickers.get(symbol).map(|t| t.min)
    }

    /// Highest observed price and when it was seen
    pub fn max_price(&self, symbol: &str) -> Option<(f64, DateTime<Utc>)> {
        let tickers = self.tickers.lock().unwrap();
        tickers.get(symbol).map(|t| t.max)
    }

    /// Drop all cached prices and extrema
    pub fn reset(&self) {
        self.tickers.lock().unwrap().clear();
    }

    /// Fetch a kline range, paging over the per-request candle limit
    ///
    /// Pages cover `[t, t + granularity * MAX_CANDLES_PER_REQUEST]`, each
    /// next page starting one granularity past the previous page's end. The
    /// exchange serves candles newest-first, so each page is reversed before
    /// appending and the merged result ascends by timestamp. A not-found
    /// page is retried after a short delay; other faults abort the range.
    pub async fn get_klines_range(
        &self,
        client: &dyn ExchangeClient,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: Granularity,
    ) -> Result<Vec<Kline>> {
        let step = granularity.as_secs();
        let end_ts = end.timestamp();
        let mut cursor = start.timestamp();
        let mut klines = Vec::new();

        while cursor <= end_ts {
            let page_end = (cursor + step * MAX_CANDLES_PER_REQUEST).min(end_ts);
            let raw = self
                .fetch_page(client, symbol, cursor, page_end, granularity)
                .await?;

            // Newest-first within the page
            for candle in raw.into_iter().rev() {
                klines.push(Kline {
                    timestamp: Utc
                        .timestamp_opt(candle.start, 0)
                        .single()
                        .unwrap_or_else(Utc::now),
                    low: candle.low,
                    high: candle.high,
                    open: candle.open,
                    close: candle.close,
                    volume: candle.volume,
                });
            }

            cursor = page_end + step;
            if cursor <= end_ts {
                sleep(Duration::from_millis(PAGE_DELAY_MS)).await;
            }
        }

        tracing::debug!(symbol, count = klines.len(), "assembled kline range");
        Ok(klines)
    }

    async fn fetch_page(
        &self,
        client: &dyn ExchangeClient,
        symbol: &str,
        start: i64,
        end: i64,
        granularity: Granularity,
    ) -> Result<Vec<crate::exchange::RawCandle>> {
        let mut attempt = 1;
        loop {
            match client.get_candles(symbol, start, end, granularity).await {
                Ok(raw) => return Ok(raw),
                Err(ExchangeError::NotFound(msg)) if attempt < MAX_PAGE_ATTEMPTS => {
                    tracing::warn!(
                        symbol,
                        start,
                        attempt,
                        "candle page not found ({}), retrying",
                        msg
                    );
                    sleep(Duration::from_millis(RETRY_DELAY_MS)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Value all balances in `target` currency
    ///
    /// Target-denominated assets count at face value; stable currencies
    /// convert 1:1 among themselves; everything else goes through the direct
    /// pair price, falling back to an alternate stable-quote pair when the
    /// target is stable. An unpriceable asset contributes zero in non-strict
    /// mode; in strict mode (simulation) it voids the whole valuation to 0.0
    /// so missing prices cannot silently under-report equity.
    pub fn total_value(&self, balances: &HashMap<String, f64>, target: &str, strict: bool) -> f64 {
        let mut total = 0.0;

        for (asset, &amount) in balances {
            if amount == 0.0 {
                continue;
            }

            if asset == target {
                total += amount;
                continue;
            }

            if self.is_stable(asset) && self.is_stable(target) {
                total += amount;
                continue;
            }

            let direct = self.get_price(&format!("{}-{}", asset, target));
            if direct > 0.0 {
                total += amount * direct;
                continue;
            }

            if let Some(converted) = self.stable_fallback(asset, target, amount) {
                total += converted;
                continue;
            }

            if strict {
                tracing::warn!(asset, target, "no price for asset; voiding valuation");
                return 0.0;
            }
            tracing::debug!(asset, target, "no price for asset; excluding from total");
        }

        total
    }

    /// Price an asset through an alternate stable quote when the target is
    /// itself stable (the pairs are treated as 1:1-equivalent)
    fn stable_fallback(&self, asset: &str, target: &str, amount: f64) -> Option<f64> {
        if !self.is_stable(target) {
            return None;
        }

        for stable in &self.stable_currencies {
            if stable == target {
                continue;
            }
            let price = self.get_price(&format!("{}-{}", asset, stable));
            if price > 0.0 {
                return Some(amount * price);
            }
        }
        None
    }

    fn is_stable(&self, currency: &str) -> bool {
        self.stable_currencies.iter().any(|c| c == currency)
    }
}

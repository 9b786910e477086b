use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::Context;

use crate::account::ledger::precision_from_step;
use crate::exchange::{ExchangeClient, RawProduct};
use crate::models::SymbolInfo;

/// Order types every tradeable pair supports on this venue
const SUPPORTED_ORDER_TYPES: &[&str] = &["MARKET", "LIMIT", "STOP_LIMIT"];

/// Static exchange metadata: symbol step sizes, precision, disabled flags
///
/// Immutable once loaded; [`ExchangeInfo::reload`] is the only refresh path.
/// When a cache path is configured the metadata is written there once after
/// the first fetch and read from disk on later constructions.
pub struct ExchangeInfo {
    symbols: HashMap<String, SymbolInfo>,
    cache_path: Option<PathBuf>,
}

impl ExchangeInfo {
    /// Build from already-fetched product metadata
    pub fn from_products(products: Vec<RawProduct>) -> Self {
        let symbols = products
            .into_iter()
            .map(|p| {
                let info = symbol_info_from_product(&p);
                (p.id, info)
            })
            .collect();

        Self {
            symbols,
            cache_path: None,
        }
    }

    /// Load metadata, preferring the cache file when present
    pub async fn load(
        client: &dyn ExchangeClient,
        cache_path: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        if let Some(path) = &cache_path {
            if path.exists() {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("reading metadata cache {}", path.display()))?;
                let symbols: HashMap<String, SymbolInfo> = serde_json::from_str(&text)
                    .with_context(|| format!("parsing metadata cache {}", path.display()))?;
                tracing::info!(
                    count = symbols.len(),
                    path = %path.display(),
                    "loaded exchange metadata from cache"
                );
                return Ok(Self {
                    symbols,
                    cache_path,
                });
            }
        }

        let mut info = Self {
            symbols: HashMap::new(),
            cache_path,
        };
        info.reload(client).await?;
        Ok(info)
    }

    /// Fetch fresh metadata from the exchange and rewrite the cache file
    pub async fn reload(&mut self, client: &dyn ExchangeClient) -> anyhow::Result<()> {
        let products = client.list_products().await?;
        self.symbols = products
            .into_iter()
            .map(|p| {
                let info = symbol_info_from_product(&p);
                (p.id, info)
            })
            .collect();

        tracing::info!(count = self.symbols.len(), "fetched exchange metadata");

        if let Some(path) = &self.cache_path {
            let text = serde_json::to_string(&self.symbols)?;
            fs::write(path, text)
                .with_context(|| format!("writing metadata cache {}", path.display()))?;
            tracing::debug!(path = %path.display(), "wrote exchange metadata cache");
        }

        Ok(())
    }

    pub fn get(&self, symbol: &str) -> Option<&SymbolInfo> {
        self.symbols.get(symbol)
    }

    /// Known symbol with trading enabled
    pub fn is_tradable(&self, symbol: &str) -> bool {
        self.symbols
            .get(symbol)
            .map(|s| !s.trading_disabled)
            .unwrap_or(false)
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// Distinct base assets, sorted
    pub fn base_currencies(&self) -> Vec<String> {
        let mut bases: Vec<String> = self.symbols.values().map(|s| s.base.clone()).collect();
        bases.sort();
        bases.dedup();
        bases
    }

    /// Distinct quote currencies, sorted
    pub fn quote_currencies(&self) -> Vec<String> {
        let mut quotes: Vec<String> = self.symbols.values().map(|s| s.currency.clone()).collect();
        quotes.sort();
        quotes.dedup();
        quotes
    }
}

fn symbol_info_from_product(product: &RawProduct) -> SymbolInfo {
    SymbolInfo {
        base: product.base_asset.clone(),
        currency: product.quote_asset.clone(),
        min_qty: product.base_min_size,
        min_price: product.quote_min_size,
        base_step_size: product.base_step.clone(),
        currency_step_size: product.quote_step.clone(),
        base_precision: precision_from_step(&product.base_step).unwrap_or(8),
        currency_precision: precision_from_step(&product.quote_step).unwrap_or(2),
        is_currency_pair: product.id.contains('-'),
        order_types: SUPPORTED_ORDER_TYPES
            .iter()
            .map(|t| t.to_string())
            .collect(),
        trading_disabled: product.trading_disabled,
    }
}

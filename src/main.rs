use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::time::{interval, Duration};

use tidebot::account::{Account, ExchangeInfo, ExecutionMode, TradingAccount};
use tidebot::exchange::{ExchangeClient, RestExchangeClient};
use tidebot::Result;

const DEFAULT_SYMBOL: &str = "BTC-USD";
const DEFAULT_POLL_SECONDS: u64 = 60;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    tracing::info!("Tidebot starting - paper trading driver");

    let api_base = std::env::var("EXCHANGE_API_BASE").ok();
    let api_key = std::env::var("EXCHANGE_API_KEY").unwrap_or_default();
    let symbol = std::env::var("TRADE_SYMBOL").unwrap_or_else(|_| DEFAULT_SYMBOL.to_string());
    let quote_funds = get_initial_quote_funds();
    let poll_seconds = std::env::var("POLL_INTERVAL_SECONDS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_POLL_SECONDS);

    let client: Arc<dyn ExchangeClient> = Arc::new(match api_base {
        Some(base) => RestExchangeClient::with_base_url(base, api_key),
        None => RestExchangeClient::new(api_key),
    });

    let metadata_cache = std::env::var("METADATA_CACHE_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("exchange_metadata.json"));
    let info = ExchangeInfo::load(client.as_ref(), Some(metadata_cache)).await?;
    tracing::info!(symbols = info.symbol_count(), "exchange metadata ready");

    let quote_currency = info
        .get(&symbol)
        .map(|s| s.currency.clone())
        .ok_or_else(|| format!("unknown symbol {}", symbol))?;

    let stable_currencies = vec![
        "USD".to_string(),
        "USDC".to_string(),
        "USDT".to_string(),
        "DAI".to_string(),
    ];

    let account = TradingAccount::new(
        ExecutionMode::Simulated,
        client.clone(),
        info,
        stable_currencies,
        0.006, // taker fee
    );
    account.update_balance(&quote_currency, quote_funds, quote_funds, 0.0);

    tracing::info!("Configuration:");
    tracing::info!("  Symbol: {}", symbol);
    tracing::info!("  Starting funds: {:.2} {}", quote_funds, quote_currency);
    tracing::info!("  Poll interval: {}s", poll_seconds);
    tracing::info!("Press Ctrl+C to stop...");

    let mut ticker = interval(Duration::from_secs(poll_seconds));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = poll_once(&account, client.as_ref(), &symbol, &quote_currency).await {
                    tracing::warn!("poll failed: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    tracing::info!("Tidebot stopped");
    Ok(())
}

/// Fetch the ticker, feed the cache, and log account state
async fn poll_once(
    account: &TradingAccount,
    client: &dyn ExchangeClient,
    symbol: &str,
    quote_currency: &str,
) -> Result<()> {
    let price = client.get_price(symbol).await?;
    account.update_price(symbol, price, Utc::now());

    let equity = account.total_value(quote_currency);
    let (min, max) = (
        account.market_cache().min_price(symbol),
        account.market_cache().max_price(symbol),
    );

    tracing::info!(
        symbol,
        price,
        equity,
        session_min = min.map(|(p, _)| p).unwrap_or(0.0),
        session_max = max.map(|(p, _)| p).unwrap_or(0.0),
        "tick"
    );

    Ok(())
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tidebot=info")),
        )
        .init();
}

fn get_initial_quote_funds() -> f64 {
    std::env::var("INITIAL_QUOTE_FUNDS")
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(10000.0)
}

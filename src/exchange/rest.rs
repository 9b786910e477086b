use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::exchange::{
    ExchangeClient, ExchangeError, OrderKind, OrderRequest, RawBalance, RawCandle, RawProduct,
};
use crate::models::{Granularity, Side, StopDirection};

const DEFAULT_API_BASE: &str = "https://api.exchange-gateway.com";

/// REST-backed exchange client
#[derive(Clone)]
pub struct RestExchangeClient {
    client: Client,
    base_url: String,
    api_key: String,
}

// ============== Response Types ==============

#[derive(Debug, Deserialize)]
struct ProductsResponse {
    products: Vec<ProductRaw>,
}

#[derive(Debug, Deserialize)]
struct ProductRaw {
    product_id: String,
    base_currency: String,
    quote_currency: String,
    #[serde(default)]
    price: String,
    #[serde(default)]
    base_min_size: String,
    #[serde(default)]
    base_increment: String,
    #[serde(default)]
    quote_min_size: String,
    #[serde(default)]
    quote_increment: String,
    #[serde(default)]
    trading_disabled: bool,
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    price: String,
}

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    accounts: Vec<AccountRaw>,
}

#[derive(Debug, Deserialize)]
struct AccountRaw {
    currency: String,
    available_balance: MoneyRaw,
    hold: MoneyRaw,
}

#[derive(Debug, Deserialize)]
struct MoneyRaw {
    value: String,
}

#[derive(Debug, Deserialize)]
struct CandlesResponse {
    candles: Vec<CandleRaw>,
}

#[derive(Debug, Deserialize)]
struct CandleRaw {
    start: String,
    low: String,
    high: String,
    open: String,
    close: String,
    volume: String,
}

// ============== Implementation ==============

impl RestExchangeClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(DEFAULT_API_BASE.to_string(), api_key)
    }

    /// Point the client at a different gateway (tests use a local mock)
    pub fn with_base_url(base_url: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, ExchangeError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .header("X-API-KEY", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ExchangeError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            return Err(ExchangeError::Api {
                code: status.as_u16().to_string(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        Ok(response.json().await?)
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, ExchangeError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .header("X-API-KEY", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ExchangeError::NotFound(path.to_string()));
        }
        // Order rejections arrive as success=false envelopes in the body;
        // only non-2xx statuses without a body become API errors here.
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if let Ok(value) = serde_json::from_str::<Value>(&body) {
                return Ok(value);
            }
            return Err(ExchangeError::Api {
                code: status.as_u16().to_string(),
                message: body,
            });
        }

        Ok(response.json().await?)
    }

    fn order_body(request: &OrderRequest) -> Value {
        let side = match request.side {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
            Side::Unknown | Side::None => "UNKNOWN",
        };

        let configuration = match request.kind {
            OrderKind::Market => json!({
                "market_market_ioc": {"base_size": request.size.to_string()}
            }),
            OrderKind::Limit => json!({
                "limit_limit_gtc": {
                    "base_size": request.size.to_string(),
                    "limit_price": request.price.unwrap_or(0.0).to_string()
                }
            }),
            OrderKind::StopLimit => json!({
                "stop_limit_stop_limit_gtc": {
                    "base_size": request.size.to_string(),
                    "limit_price": request.price.unwrap_or(0.0).to_string(),
                    "stop_price": request.stop_price.unwrap_or(0.0).to_string(),
                    "stop_direction": match request.stop_direction {
                        StopDirection::Above => "STOP_DIRECTION_STOP_UP",
                        StopDirection::Below => "STOP_DIRECTION_STOP_DOWN",
                        StopDirection::None | StopDirection::Unknown => "UNKNOWN",
                    }
                }
            }),
        };

        json!({
            "client_order_id": Uuid::new_v4().to_string(),
            "product_id": request.symbol,
            "side": side,
            "order_configuration": configuration,
        })
    }
}

fn parse_num(text: &str) -> f64 {
    text.parse().unwrap_or(0.0)
}

#[async_trait::async_trait]
impl ExchangeClient for RestExchangeClient {
    async fn list_products(&self) -> Result<Vec<RawProduct>, ExchangeError> {
        let response: ProductsResponse = self.get_json("/api/v3/brokerage/products").await?;

        Ok(response
            .products
            .into_iter()
            .map(|p| RawProduct {
                id: p.product_id,
                base_asset: p.base_currency,
                quote_asset: p.quote_currency,
                price: parse_num(&p.price),
                base_min_size: parse_num(&p.base_min_size),
                base_step: p.base_increment,
                quote_min_size: parse_num(&p.quote_min_size),
                quote_step: p.quote_increment,
                trading_disabled: p.trading_disabled,
            })
            .collect())
    }

    async fn get_price(&self, symbol: &str) -> Result<f64, ExchangeError> {
        let path = format!("/api/v3/brokerage/products/{}/ticker", symbol);
        let response: TickerResponse = self.get_json(&path).await?;

        response
            .price
            .parse()
            .map_err(|_| ExchangeError::Malformed(format!("unparseable price: {}", response.price)))
    }

    async fn list_balances(&self) -> Result<Vec<RawBalance>, ExchangeError> {
        let response: AccountsResponse = self.get_json("/api/v3/brokerage/accounts").await?;

        Ok(response
            .accounts
            .into_iter()
            .map(|a| RawBalance {
                asset: a.currency,
                available: parse_num(&a.available_balance.value),
                hold: parse_num(&a.hold.value),
            })
            .collect())
    }

    async fn place_order(&self, request: &OrderRequest) -> Result<Value, ExchangeError> {
        self.post_json("/api/v3/brokerage/orders", &Self::order_body(request))
            .await
    }

    async fn cancel_order(&self, order_id: &str) -> Result<Value, ExchangeError> {
        self.post_json(
            "/api/v3/brokerage/orders/batch_cancel",
            &json!({"order_ids": [order_id]}),
        )
        .await
    }

    async fn get_order(&self, order_id: &str) -> Result<Value, ExchangeError> {
        let path = format!("/api/v3/brokerage/orders/historical/{}", order_id);
        self.get_json(&path).await
    }

    async fn get_candles(
        &self,
        symbol: &str,
        start: i64,
        end: i64,
        granularity: Granularity,
    ) -> Result<Vec<RawCandle>, ExchangeError> {
        let path = format!(
            "/api/v3/brokerage/products/{}/candles?start={}&end={}&granularity={}",
            symbol,
            start,
            end,
            granularity.label()
        );
        let response: CandlesResponse = self.get_json(&path).await?;

        Ok(response
            .candles
            .into_iter()
            .map(|c| RawCandle {
                start: c.start.parse().unwrap_or(0),
                low: parse_num(&c.low),
                high: parse_num(&c.high),
                open: parse_num(&c.open),
                close: parse_num(&c.close),
                volume: parse_num(&c.volume),
            })
            .collect())
    }
}

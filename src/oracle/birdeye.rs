use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::models::Candle;
use crate::oracle::{OracleError, PriceOracle, Resolution};

const DEFAULT_BASE_URL: &str = "https://public-api.birdeye.so";

pub struct BirdeyeOracle {
    http: Client,
    base_url: String,
    api_key: String,
}

impl BirdeyeOracle {
    pub fn new(config: &Config) -> Result<Self, OracleError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| OracleError::Http(e.to_string()))?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: config.birdeye_api_key.clone().unwrap_or_default(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn candle_type(resolution: Resolution) -> &'static str {
        match resolution {
            Resolution::OneMinute => "1m",
            Resolution::FiveMinutes => "5m",
            Resolution::OneHour => "1H",
            Resolution::OneDay => "1D",
        }
    }
}

#[async_trait]
impl PriceOracle for BirdeyeOracle {
    async fn get_candles(
        &self,
        mint: &str,
        start: i64,
        end: i64,
        resolution: Resolution,
    ) -> Result<Vec<Candle>, OracleError> {
        let url = format!("{}/defi/ohlcv", self.base_url);
        let value: Value = self
            .http
            .get(&url)
            .header("X-API-KEY", &self.api_key)
            .header("x-chain", "solana")
            .query(&[
                ("address", mint.to_string()),
                ("type", Self::candle_type(resolution).to_string()),
                ("time_from", start.to_string()),
                ("time_to", end.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let items = value
            .pointer("/data/items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let candles = items
            .iter()
            .filter_map(|item| {
                Some(Candle {
                    t: item.get("unixTime").and_then(Value::as_i64)?,
                    open: decimal_field(item, "o")?,
                    high: decimal_field(item, "h")?,
                    low: decimal_field(item, "l")?,
                    close: decimal_field(item, "c")?,
                })
            })
            .collect::<Vec<_>>();

        debug!(mint, start, end, count = candles.len(), "fetched candles");
        Ok(candles)
    }

    async fn current_price_usd(&self, mint: &str) -> Result<Option<Decimal>, OracleError> {
        let url = format!("{}/defi/price", self.base_url);
        let value: Value = self
            .http
            .get(&url)
            .header("X-API-KEY", &self.api_key)
            .header("x-chain", "solana")
            .query(&[("address", mint)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(value
            .pointer("/data/value")
            .and_then(Value::as_f64)
            .and_then(Decimal::from_f64))
    }
}

fn decimal_field(item: &Value, key: &str) -> Option<Decimal> {
    item.get(key).and_then(Value::as_f64).and_then(Decimal::from_f64)
}

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use tracing::debug;

use crate::config::Config;
use crate::models::Candle;
use crate::oracle::{OracleError, PriceOracle, Resolution};

const DEFAULT_BASE_URL: &str = "https://api.geckoterminal.com/api/v2";

/// Keyless fallback oracle. Candles come from the token's top pool, so the
/// pool address is resolved once per mint and memoized.
pub struct GeckoTerminalOracle {
    http: Client,
    base_url: String,
    pool_cache: Cache<String, String>,
}

impl GeckoTerminalOracle {
    pub fn new(config: &Config) -> Result<Self, OracleError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| OracleError::Http(e.to_string()))?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            pool_cache: Cache::builder()
                .max_capacity(config.cache_max_capacity)
                .time_to_live(config.cache_ttl)
                .build(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn top_pool(&self, mint: &str) -> Result<Option<String>, OracleError> {
        if let Some(pool) = self.pool_cache.get(mint).await {
            return Ok(Some(pool));
        }

        let url = format!("{}/networks/solana/tokens/{}/pools", self.base_url, mint);
        let value: Value = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let pool = value
            .pointer("/data/0/attributes/address")
            .and_then(Value::as_str)
            .map(|s| s.to_string());

        if let Some(pool) = &pool {
            self.pool_cache.insert(mint.to_string(), pool.clone()).await;
        }
        Ok(pool)
    }

    fn timeframe(resolution: Resolution) -> (&'static str, &'static str) {
        match resolution {
            Resolution::OneMinute => ("minute", "1"),
            Resolution::FiveMinutes => ("minute", "5"),
            Resolution::OneHour => ("hour", "1"),
            Resolution::OneDay => ("day", "1"),
        }
    }
}

#[async_trait]
impl PriceOracle for GeckoTerminalOracle {
    async fn get_candles(
        &self,
        mint: &str,
        start: i64,
        end: i64,
        resolution: Resolution,
    ) -> Result<Vec<Candle>, OracleError> {
        let Some(pool) = self.top_pool(mint).await? else {
            debug!(mint, "no pool found for candles");
            return Ok(Vec::new());
        };

        let (timeframe, aggregate) = Self::timeframe(resolution);
        let span = (end - start).max(resolution.seconds());
        let limit = (span / resolution.seconds() + 1).clamp(1, 1000);
        let url = format!(
            "{}/networks/solana/pools/{}/ohlcv/{}",
            self.base_url, pool, timeframe
        );
        let value: Value = self
            .http
            .get(&url)
            .query(&[
                ("aggregate", aggregate.to_string()),
                ("before_timestamp", end.to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // Each entry is [timestamp, open, high, low, close, volume].
        let rows = value
            .pointer("/data/attributes/ohlcv_list")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut candles: Vec<Candle> = rows
            .iter()
            .filter_map(|row| {
                let row = row.as_array()?;
                let t = row.first()?.as_i64()?;
                if t < start || t > end {
                    return None;
                }
                Some(Candle {
                    t,
                    open: json_decimal(row.get(1)?)?,
                    high: json_decimal(row.get(2)?)?,
                    low: json_decimal(row.get(3)?)?,
                    close: json_decimal(row.get(4)?)?,
                })
            })
            .collect();
        candles.sort_by_key(|c| c.t);
        Ok(candles)
    }

    async fn current_price_usd(&self, mint: &str) -> Result<Option<Decimal>, OracleError> {
        let url = format!(
            "{}/simple/networks/solana/token_price/{}",
            self.base_url, mint
        );
        let value: Value = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(value
            .pointer("/data/attributes/token_prices")
            .and_then(|prices| prices.get(mint))
            .and_then(Value::as_str)
            .and_then(|s| Decimal::from_str(s).ok()))
    }
}

fn json_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => Decimal::from_str(s).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
}

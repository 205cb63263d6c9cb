use async_trait::async_trait;
use moka::future::Cache;
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::db::candle;
use crate::models::Candle;
use crate::oracle::{OracleError, PriceOracle, Resolution};

/// Read-through cache over any oracle: candles land in the `candles` table,
/// current prices in a short-lived in-memory cache.
pub struct CachingOracle {
    inner: Arc<dyn PriceOracle>,
    pool: SqlitePool,
    price_cache: Cache<String, Option<Decimal>>,
}

impl CachingOracle {
    pub fn new(inner: Arc<dyn PriceOracle>, pool: SqlitePool, config: &Config) -> Self {
        Self {
            inner,
            pool,
            price_cache: Cache::builder()
                .time_to_live(config.cache_ttl)
                .max_capacity(config.cache_max_capacity)
                .build(),
        }
    }
}

#[async_trait]
impl PriceOracle for CachingOracle {
    async fn get_candles(
        &self,
        mint: &str,
        start: i64,
        end: i64,
        resolution: Resolution,
    ) -> Result<Vec<Candle>, OracleError> {
        let cached = candle::get_range(&self.pool, mint, resolution.as_str(), start, end).await?;
        if !cached.is_empty() {
            debug!(mint, count = cached.len(), "candle cache hit");
            return Ok(cached);
        }

        let fetched = self.inner.get_candles(mint, start, end, resolution).await?;
        candle::upsert_many(&self.pool, mint, resolution.as_str(), &fetched).await?;
        Ok(fetched)
    }

    async fn current_price_usd(&self, mint: &str) -> Result<Option<Decimal>, OracleError> {
        if let Some(price) = self.price_cache.get(mint).await {
            return Ok(price);
        }
        let price = self.inner.current_price_usd(mint).await?;
        self.price_cache.insert(mint.to_string(), price).await;
        Ok(price)
    }
}

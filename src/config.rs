use dotenv::dotenv;
use std::env;
use std::time::Duration;

use crate::error::IndexerError;

/// Which upstream feeds historical OHLC candles and current prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceProvider {
    Birdeye,
    GeckoTerminal,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub helius_api_key: String,
    pub database_url: String,
    pub timeout: Duration,
    pub page_limit: usize,
    pub max_pages: u32,
    pub price_provider: PriceProvider,
    pub birdeye_api_key: Option<String>,
    pub cache_ttl: Duration,
    pub cache_max_capacity: u64,
    pub provider_concurrency: usize,
    pub provider_rps: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, IndexerError> {
        dotenv().ok();

        let helius_api_key = env::var("HELIUS_API_KEY").map_err(|_| {
            IndexerError::InvalidInput("HELIUS_API_KEY is not set".to_string())
        })?;

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:wallet_ledger.db".to_string());
        let timeout = env::var("INDEXER_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(20_000));
        let page_limit = env::var("INDEXER_PAGE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1000);
        let max_pages = env::var("MAX_PAGES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1000);
        let price_provider = match env::var("PRICE_PROVIDER").as_deref() {
            Ok("geckoterminal") => PriceProvider::GeckoTerminal,
            _ => PriceProvider::Birdeye,
        };
        let birdeye_api_key = env::var("BIRDEYE_API_KEY").ok();
        let cache_ttl = env::var("CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(300));
        let cache_max_capacity = env::var("CACHE_MAX_CAPACITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10_000);
        let provider_concurrency = env::var("PROVIDER_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2);
        let provider_rps = env::var("PROVIDER_RPS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2);

        Ok(Self {
            helius_api_key,
            database_url,
            timeout,
            page_limit,
            max_pages,
            price_provider,
            birdeye_api_key,
            cache_ttl,
            cache_max_capacity,
            provider_concurrency,
            provider_rps,
        })
    }
}

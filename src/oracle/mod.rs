pub mod birdeye;
pub mod caching;
pub mod gecko;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::Candle;

pub use birdeye::BirdeyeOracle;
pub use caching::CachingOracle;
pub use gecko::GeckoTerminalOracle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    OneMinute,
    FiveMinutes,
    OneHour,
    OneDay,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::OneMinute => "1m",
            Resolution::FiveMinutes => "5m",
            Resolution::OneHour => "1h",
            Resolution::OneDay => "1d",
        }
    }

    pub fn seconds(&self) -> i64 {
        match self {
            Resolution::OneMinute => 60,
            Resolution::FiveMinutes => 300,
            Resolution::OneHour => 3600,
            Resolution::OneDay => 86_400,
        }
    }
}

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("oracle http error: {0}")]
    Http(String),

    #[error("oracle store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("undecodable oracle response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            OracleError::Decode(err.to_string())
        } else {
            OracleError::Http(err.to_string())
        }
    }
}

/// Historical candles and current prices. Lookups are best-effort: callers
/// degrade to neutral metrics when an answer is `Err` or `None`.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn get_candles(
        &self,
        mint: &str,
        start: i64,
        end: i64,
        resolution: Resolution,
    ) -> Result<Vec<Candle>, OracleError>;

    async fn current_price_usd(&self, mint: &str) -> Result<Option<Decimal>, OracleError>;

    /// Price at a point in time: the close of the latest candle at or before
    /// `ts`, searched over the preceding hour of minute candles, then the
    /// preceding day of hourly candles.
    async fn price_at(&self, mint: &str, ts: i64) -> Result<Option<Decimal>, OracleError> {
        for resolution in [Resolution::OneMinute, Resolution::OneHour] {
            let window = resolution.seconds() * 60;
            let candles = self
                .get_candles(mint, ts - window, ts, resolution)
                .await?;
            if let Some(candle) = candles.iter().filter(|c| c.t <= ts).max_by_key(|c| c.t) {
                return Ok(Some(candle.close));
            }
        }
        Ok(None)
    }
}

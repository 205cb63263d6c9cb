//! Shared fixtures: an in-memory store, a scriptable provider and a
//! table-driven oracle.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::config::{Config, PriceProvider};
use crate::db::migration;
use crate::gate::RateGate;
use crate::metadata::TokenMetaResolver;
use crate::models::{Candle, Direction, Side, WalletEvent};
use crate::oracle::{OracleError, PriceOracle, Resolution};
use crate::provider::models::{
    EnhancedTransaction, Instruction, NativeTransfer, ProviderPage, TokenTransfer,
};
use crate::provider::{ProviderError, TransactionProvider};

// Ordinary on-curve system wallets.
pub const WALLET: &str = "9ii1FEiWSgDzXAbwj2oTmJXzkfCw78mnHwPQv9WQ5iTn";
pub const COUNTERPARTY: &str = "AhAkbf3cGD6HkFod2rBEE8mie8ks9p7vuss6WGkUFAM9";

pub const TOKEN1: &str = "FwKc3s5x7SguXzNPPJP7AV2UUhCF4rnEQCFdA2Q8NGCi";
pub const TOKEN2: &str = "424CJUQd2RQWNgygWbNpRmQStZ77Mea2f29CATe8M2hS";

pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    migration::run_migrations(&pool).await.expect("migrations");
    pool
}

pub fn test_config() -> Config {
    Config {
        helius_api_key: "test-key".to_string(),
        database_url: "sqlite::memory:".to_string(),
        timeout: Duration::from_secs(5),
        page_limit: 100,
        max_pages: 1000,
        price_provider: PriceProvider::Birdeye,
        birdeye_api_key: None,
        cache_ttl: Duration::from_secs(60),
        cache_max_capacity: 1000,
        provider_concurrency: 2,
        provider_rps: 1000,
    }
}

/// Resolver with no upstream sources: local table, store, derived fallback.
pub fn test_resolver(pool: SqlitePool) -> Arc<TokenMetaResolver> {
    Arc::new(TokenMetaResolver::new(
        pool,
        Arc::new(RateGate::new(2, 1000)),
        Vec::new(),
        &test_config(),
    ))
}

/// Provider that replays a script of pages and records the `before` cursor
/// of every call. Once the script is exhausted it returns empty pages.
pub struct MockProvider {
    pages: Mutex<VecDeque<Result<ProviderPage, ProviderError>>>,
    calls: Mutex<Vec<Option<String>>>,
}

impl MockProvider {
    pub fn new(pages: Vec<Result<ProviderPage, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            pages: Mutex::new(pages.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub async fn recorded_calls(&self) -> Vec<Option<String>> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl TransactionProvider for MockProvider {
    async fn fetch_page(
        &self,
        _wallet: &str,
        before: Option<&str>,
        _limit: usize,
    ) -> Result<ProviderPage, ProviderError> {
        self.calls.lock().await.push(before.map(String::from));
        self.pages
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(ProviderPage::default()))
    }
}

pub fn page(items: Vec<EnhancedTransaction>, next_before: Option<&str>) -> ProviderPage {
    ProviderPage {
        items,
        next_before: next_before.map(String::from),
    }
}

pub fn tx(signature: &str, slot: i64, timestamp: i64) -> EnhancedTransaction {
    EnhancedTransaction {
        signature: signature.to_string(),
        slot,
        timestamp: Some(timestamp),
        ..Default::default()
    }
}

pub fn token_transfer(
    mint: &str,
    from: Option<&str>,
    to: Option<&str>,
    amount: f64,
) -> TokenTransfer {
    TokenTransfer {
        mint: Some(mint.to_string()),
        from_user_account: from.map(String::from),
        to_user_account: to.map(String::from),
        token_amount: Some(amount),
        ..Default::default()
    }
}

pub fn native_transfer(from: Option<&str>, to: Option<&str>, lamports: i64) -> NativeTransfer {
    NativeTransfer {
        from_user_account: from.map(String::from),
        to_user_account: to.map(String::from),
        amount: Some(lamports),
        ..Default::default()
    }
}

pub fn instruction(program_id: &str) -> Instruction {
    Instruction {
        program_id: Some(program_id.to_string()),
        ..Default::default()
    }
}

/// A transaction whose normalization yields one BUY event for `WALLET`.
pub fn incoming_tx(signature: &str, slot: i64, timestamp: i64) -> EnhancedTransaction {
    let mut t = tx(signature, slot, timestamp);
    t.token_transfers = vec![token_transfer(
        TOKEN1,
        Some(COUNTERPARTY),
        Some(WALLET),
        1.0,
    )];
    t
}

pub fn ledger_event(
    signature: &str,
    event_index: i64,
    block_time: i64,
    mint: &str,
    side: Side,
    amount_ui: Decimal,
) -> WalletEvent {
    let direction = match side {
        Side::Buy => Direction::In,
        Side::Sell => Direction::Out,
        _ => Direction::None,
    };
    WalletEvent {
        wallet: WALLET.to_string(),
        signature: signature.to_string(),
        event_index,
        slot: block_time,
        block_time,
        program: None,
        side,
        direction,
        token_mint: mint.to_string(),
        token_symbol: "TKN".to_string(),
        token_decimals: 9,
        amount_raw: amount_ui.to_string(),
        amount_ui,
        amount_usd: None,
        price_usd_at_tx: None,
        link_id: None,
        fee_base_units: None,
        metadata: None,
    }
}

pub fn candle(t: i64, high: Decimal, close: Decimal) -> Candle {
    Candle {
        t,
        open: close,
        high,
        low: close,
        close,
    }
}

/// Oracle answering from fixed tables; anything absent is unknown.
#[derive(Default)]
pub struct MockOracle {
    pub candles: HashMap<String, Vec<Candle>>,
    pub prices_at: HashMap<(String, i64), Decimal>,
    pub current: HashMap<String, Decimal>,
}

#[async_trait]
impl PriceOracle for MockOracle {
    async fn get_candles(
        &self,
        mint: &str,
        start: i64,
        end: i64,
        _resolution: Resolution,
    ) -> Result<Vec<Candle>, OracleError> {
        Ok(self
            .candles
            .get(mint)
            .map(|candles| {
                candles
                    .iter()
                    .filter(|c| c.t >= start && c.t <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn current_price_usd(&self, mint: &str) -> Result<Option<Decimal>, OracleError> {
        Ok(self.current.get(mint).copied())
    }

    async fn price_at(&self, mint: &str, ts: i64) -> Result<Option<Decimal>, OracleError> {
        Ok(self.prices_at.get(&(mint.to_string(), ts)).copied())
    }
}

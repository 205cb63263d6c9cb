// Token metadata resolution. `batch` never fails: every requested mint
// receives an entry, falling back to a derived one when the local table,
// the caches, and every upstream source come up empty.

use async_trait::async_trait;
use moka::future::Cache;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::Config;
use crate::db::token_meta;
use crate::gate::RateGate;
use crate::ingest::normalizer::short_mint;
use crate::models::{MetaSourceKind, TokenMeta};

static WELL_KNOWN: Lazy<HashMap<&'static str, (&'static str, u8)>> = Lazy::new(|| {
    HashMap::from([
        ("So11111111111111111111111111111111111111112", ("SOL", 9)),
        ("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v", ("USDC", 6)),
        ("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB", ("USDT", 6)),
        ("DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263", ("BONK", 5)),
        ("mSoLzYCxHdYgdzU16g5QSh3i5K3z3KZK7ytfqcJm7So", ("mSOL", 9)),
    ])
});

/// One upstream metadata source. Sources are best-effort: a failure is
/// logged and the next source is tried. Every HTTP request a source makes
/// must hold a permit from the resolver's gate.
#[async_trait]
pub trait MetaSource: Send + Sync {
    fn kind(&self) -> MetaSourceKind;
    async fn fetch(
        &self,
        mints: &[String],
        gate: &RateGate,
    ) -> Result<Vec<TokenMeta>, reqwest::Error>;
}

pub struct TokenMetaResolver {
    pool: SqlitePool,
    gate: Arc<RateGate>,
    sources: Vec<Box<dyn MetaSource>>,
    cache: Cache<String, TokenMeta>,
}

impl TokenMetaResolver {
    pub fn new(
        pool: SqlitePool,
        gate: Arc<RateGate>,
        sources: Vec<Box<dyn MetaSource>>,
        config: &Config,
    ) -> Self {
        Self {
            pool,
            gate,
            sources,
            cache: Cache::builder()
                .time_to_live(config.cache_ttl)
                .max_capacity(config.cache_max_capacity)
                .build(),
        }
    }

    /// Resolve metadata for every mint. Order: well-known table, in-memory
    /// cache, store, upstream sources, derived fallback. Derived entries
    /// stay in the in-memory cache only, so upstream is retried next run.
    pub async fn batch(&self, mints: &[String]) -> HashMap<String, TokenMeta> {
        let mut resolved: HashMap<String, TokenMeta> = HashMap::new();
        let mut unresolved: Vec<String> = Vec::new();

        for mint in mints {
            if resolved.contains_key(mint) {
                continue;
            }
            if let Some((symbol, decimals)) = WELL_KNOWN.get(mint.as_str()) {
                resolved.insert(
                    mint.clone(),
                    TokenMeta {
                        mint: mint.clone(),
                        symbol: symbol.to_string(),
                        name: None,
                        decimals: *decimals,
                        source: MetaSourceKind::Local,
                    },
                );
            } else if let Some(meta) = self.cache.get(mint).await {
                resolved.insert(mint.clone(), meta);
            } else {
                unresolved.push(mint.clone());
            }
        }

        if !unresolved.is_empty() {
            match token_meta::get_many(&self.pool, &unresolved).await {
                Ok(stored) => {
                    unresolved.retain(|m| !stored.contains_key(m));
                    for (mint, meta) in stored {
                        self.cache.insert(mint.clone(), meta.clone()).await;
                        resolved.insert(mint, meta);
                    }
                }
                Err(e) => warn!("token metadata store lookup failed: {}", e),
            }
        }

        for source in &self.sources {
            if unresolved.is_empty() {
                break;
            }
            match source.fetch(&unresolved, &self.gate).await {
                Ok(found) => {
                    for meta in found {
                        unresolved.retain(|m| m != &meta.mint);
                        if let Err(e) = token_meta::upsert(&self.pool, &meta).await {
                            warn!("failed to persist token metadata for {}: {}", meta.mint, e);
                        }
                        self.cache.insert(meta.mint.clone(), meta.clone()).await;
                        resolved.insert(meta.mint.clone(), meta);
                    }
                }
                Err(e) => {
                    warn!(
                        source = source.kind().as_str(),
                        "metadata source failed: {}", e
                    );
                }
            }
        }

        for mint in unresolved {
            debug!(mint = %mint, "falling back to derived token metadata");
            let meta = derived_meta(&mint);
            self.cache.insert(mint.clone(), meta.clone()).await;
            resolved.insert(mint, meta);
        }

        resolved
    }
}

pub fn derived_meta(mint: &str) -> TokenMeta {
    TokenMeta {
        mint: mint.to_string(),
        symbol: short_mint(mint),
        name: None,
        decimals: 9,
        source: MetaSourceKind::Derived,
    }
}

/// Helius token-metadata endpoint: one POST resolves a batch of mints.
pub struct HeliusMetaSource {
    http: Client,
    base_url: String,
    api_key: String,
}

impl HeliusMetaSource {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: Client::builder().timeout(config.timeout).build()?,
            base_url: "https://api.helius.xyz".to_string(),
            api_key: config.helius_api_key.clone(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl MetaSource for HeliusMetaSource {
    fn kind(&self) -> MetaSourceKind {
        MetaSourceKind::Helius
    }

    async fn fetch(
        &self,
        mints: &[String],
        gate: &RateGate,
    ) -> Result<Vec<TokenMeta>, reqwest::Error> {
        let url = format!("{}/v0/token-metadata?api-key={}", self.base_url, self.api_key);
        let body = serde_json::json!({ "mintAccounts": mints });
        let _permit = gate.acquire().await;
        let items: Vec<Value> = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut found = Vec::new();
        for item in items {
            let Some(mint) = item.get("account").and_then(Value::as_str) else {
                continue;
            };
            let symbol = item
                .pointer("/onChainMetadata/metadata/data/symbol")
                .and_then(Value::as_str)
                .map(|s| s.trim_end_matches('\0').to_string());
            let name = item
                .pointer("/onChainMetadata/metadata/data/name")
                .and_then(Value::as_str)
                .map(|s| s.trim_end_matches('\0').to_string());
            let decimals = item
                .pointer("/onChainAccountInfo/accountInfo/data/parsed/info/decimals")
                .and_then(Value::as_u64);

            if let (Some(symbol), Some(decimals)) = (symbol, decimals) {
                found.push(TokenMeta {
                    mint: mint.to_string(),
                    symbol,
                    name,
                    decimals: decimals.min(u8::MAX as u64) as u8,
                    source: MetaSourceKind::Helius,
                });
            }
        }
        Ok(found)
    }
}

/// Jupiter token list: one GET per mint, used as the secondary source.
pub struct JupiterMetaSource {
    http: Client,
    base_url: String,
}

impl JupiterMetaSource {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: Client::builder().timeout(config.timeout).build()?,
            base_url: "https://tokens.jup.ag".to_string(),
        })
    }
}

#[async_trait]
impl MetaSource for JupiterMetaSource {
    fn kind(&self) -> MetaSourceKind {
        MetaSourceKind::Jupiter
    }

    async fn fetch(
        &self,
        mints: &[String],
        gate: &RateGate,
    ) -> Result<Vec<TokenMeta>, reqwest::Error> {
        // One permit per request, so the fan-out stays inside the gate's
        // concurrency ceiling.
        let lookups = mints.iter().map(|mint| {
            let url = format!("{}/token/{}", self.base_url, mint);
            let http = self.http.clone();
            async move {
                let _permit = gate.acquire().await;
                let response = http.get(&url).send().await.ok()?;
                if !response.status().is_success() {
                    return None;
                }
                let item = response.json::<Value>().await.ok()?;
                let symbol = item.get("symbol").and_then(Value::as_str)?;
                let decimals = item.get("decimals").and_then(Value::as_u64)?;
                Some(TokenMeta {
                    mint: mint.clone(),
                    symbol: symbol.to_string(),
                    name: item
                        .get("name")
                        .and_then(Value::as_str)
                        .map(|s| s.to_string()),
                    decimals: decimals.min(u8::MAX as u64) as u8,
                    source: MetaSourceKind::Jupiter,
                })
            }
        });

        let found: Vec<TokenMeta> = futures::future::join_all(lookups)
            .await
            .into_iter()
            .flatten()
            .collect();
        if found.len() < mints.len() {
            debug!(
                requested = mints.len(),
                resolved = found.len(),
                "jupiter resolved a subset"
            );
        }
        Ok(found)
    }
}

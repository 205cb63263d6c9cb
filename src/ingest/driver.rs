use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::db::{raw_transaction, sync_state, wallet_event};
use crate::error::IndexerError;
use crate::ingest::normalizer;
use crate::metadata::TokenMetaResolver;
use crate::models::{IngestStats, SyncState};
use crate::provider::models::EnhancedTransaction;
use crate::provider::{ProviderError, TransactionProvider};
use crate::validation::validate_wallet_address;

/// Drives the provider for one wallet at a time: historical backfill with a
/// durable cursor, then incremental tail sync. All durable effects are
/// idempotent upserts, so an interrupted run converges on retry.
pub struct Indexer {
    provider: Arc<dyn TransactionProvider>,
    pool: SqlitePool,
    resolver: Arc<TokenMetaResolver>,
    page_limit: usize,
    max_pages: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub wallet: String,
    pub sync_state: Option<SyncState>,
    pub wallet_events: i64,
    pub total_raw_transactions: i64,
}

impl Indexer {
    pub fn new(
        provider: Arc<dyn TransactionProvider>,
        pool: SqlitePool,
        resolver: Arc<TokenMetaResolver>,
        page_limit: usize,
        max_pages: u32,
    ) -> Self {
        Self {
            provider,
            pool,
            resolver,
            page_limit,
            max_pages,
        }
    }

    /// Walk the wallet's history backward from the durable cursor until the
    /// provider is exhausted or the page cap is hit.
    pub async fn backfill(
        &self,
        wallet: &str,
        max_pages: Option<u32>,
        cancel: &CancellationToken,
    ) -> Result<IngestStats, IndexerError> {
        validate_wallet_address(wallet)?;

        let started = Instant::now();
        let retries_before = self.provider.retry_count();
        let cap = max_pages.unwrap_or(self.max_pages);

        let state = sync_state::load_or_create(&self.pool, wallet).await?;
        let mut before = state.last_before;
        let mut cursor_reset_done = false;
        let mut completed = false;
        let mut stats = IngestStats::default();

        info!(wallet, cursor = ?before, cap, "starting backfill");

        while stats.pages_fetched < cap {
            if cancel.is_cancelled() {
                info!(wallet, "backfill cancelled");
                break;
            }

            let result = tokio::select! {
                r = self.provider.fetch_page(wallet, before.as_deref(), self.page_limit) => r,
                _ = cancel.cancelled() => {
                    info!(wallet, "backfill cancelled mid-call");
                    break;
                }
            };

            let page = match result {
                Ok(page) => page,
                Err(ProviderError::CursorInvalid) if !cursor_reset_done => {
                    warn!(wallet, "cursor rejected; clearing and retrying the page");
                    before = None;
                    sync_state::set_last_before(&self.pool, wallet, None).await?;
                    cursor_reset_done = true;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if page.items.is_empty() {
                debug!(wallet, "empty page; backfill complete");
                completed = true;
                break;
            }

            let events = ingest_items(&self.pool, &self.resolver, wallet, &page.items).await?;

            stats.pages_fetched += 1;
            stats.raw_tx_count += page.items.len() as u64;
            stats.wallet_tx_count += events;
            let page_min = page.items.iter().map(|t| t.slot).min().unwrap_or(0);
            let page_max = page.items.iter().map(|t| t.slot).max().unwrap_or(0);
            stats.observe_slots(page_min, page_max);

            debug!(
                wallet,
                page = stats.pages_fetched,
                items = page.items.len(),
                events,
                "page ingested"
            );

            match page.next_before {
                Some(next) => {
                    sync_state::set_last_before(&self.pool, wallet, Some(&next)).await?;
                    before = Some(next);
                }
                None => {
                    completed = true;
                    break;
                }
            }
        }

        // A run stopped by the page cap or cancellation keeps its cursor so
        // the next run resumes; an exhausted history clears it.
        if completed {
            sync_state::set_last_before(&self.pool, wallet, None).await?;
            sync_state::set_full_scan_at(&self.pool, wallet, Utc::now().timestamp()).await?;
        }

        stats.retries = self.provider.retry_count() - retries_before;
        stats.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            wallet,
            pages = stats.pages_fetched,
            raw = stats.raw_tx_count,
            events = stats.wallet_tx_count,
            elapsed_ms = stats.elapsed_ms,
            "backfill finished"
        );
        Ok(stats)
    }

    /// Fetch only the newest page and stop at the first signature already in
    /// the store; advance the verified-slot watermark.
    pub async fn sync_tail(&self, wallet: &str) -> Result<IngestStats, IndexerError> {
        validate_wallet_address(wallet)?;

        let started = Instant::now();
        let retries_before = self.provider.retry_count();

        if sync_state::load(&self.pool, wallet).await?.is_none() {
            return Err(IndexerError::PreconditionFailed(format!(
                "no sync state for {wallet}: run backfill first"
            )));
        }

        let page = self
            .provider
            .fetch_page(wallet, None, self.page_limit)
            .await?;

        let mut new_items: Vec<EnhancedTransaction> = Vec::new();
        for item in &page.items {
            if raw_transaction::exists(&self.pool, &item.signature).await? {
                debug!(wallet, signature = %item.signature, "tail reached a known signature");
                break;
            }
            new_items.push(item.clone());
        }

        let mut stats = IngestStats::default();
        if !page.items.is_empty() {
            stats.pages_fetched = 1;
        }

        if !new_items.is_empty() {
            let events = ingest_items(&self.pool, &self.resolver, wallet, &new_items).await?;
            stats.raw_tx_count = new_items.len() as u64;
            stats.wallet_tx_count = events;
            let page_min = new_items.iter().map(|t| t.slot).min().unwrap_or(0);
            let page_max = new_items.iter().map(|t| t.slot).max().unwrap_or(0);
            stats.observe_slots(page_min, page_max);
            sync_state::set_verified_slot(&self.pool, wallet, page_max).await?;
        }

        stats.retries = self.provider.retry_count() - retries_before;
        stats.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            wallet,
            new = stats.raw_tx_count,
            events = stats.wallet_tx_count,
            "tail sync finished"
        );
        Ok(stats)
    }

    pub async fn status(&self, wallet: &str) -> Result<StatusReport, IndexerError> {
        validate_wallet_address(wallet)?;

        Ok(StatusReport {
            wallet: wallet.to_string(),
            sync_state: sync_state::load(&self.pool, wallet).await?,
            wallet_events: wallet_event::count_for_wallet(&self.pool, wallet).await?,
            total_raw_transactions: raw_transaction::count(&self.pool).await?,
        })
    }
}

/// Persist a set of provider transactions and their normalized events.
/// Shared between the driver and the reconciliation repair path.
pub(crate) async fn ingest_items(
    pool: &SqlitePool,
    resolver: &TokenMetaResolver,
    wallet: &str,
    items: &[EnhancedTransaction],
) -> Result<u64, IndexerError> {
    let raw: Vec<_> = items.iter().map(|tx| tx.to_raw()).collect();
    raw_transaction::upsert_raw_transactions(pool, &raw).await?;

    let mints: Vec<String> = items
        .iter()
        .flat_map(normalizer::referenced_mints)
        .collect::<std::collections::HashSet<_>>()
        .into_iter()
        .collect();
    let meta = resolver.batch(&mints).await;

    let mut events = Vec::new();
    for tx in items {
        events.extend(normalizer::normalize(tx, wallet, &meta));
    }
    wallet_event::upsert_wallet_events(pool, &events).await?;

    Ok(events.len() as u64)
}

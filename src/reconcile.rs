// Independent verification that the store holds every signature the
// provider reports for a slot window, with repair of anything missing and
// an append-only audit trail.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use solana_sdk::hash::hash as sha256;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::db::{raw_transaction, reconcile_audit, sync_state, wallet_event};
use crate::error::IndexerError;
use crate::ingest::driver::ingest_items;
use crate::metadata::TokenMetaResolver;
use crate::models::ReconcileAudit;
use crate::provider::models::EnhancedTransaction;
use crate::provider::TransactionProvider;
use crate::validation::validate_wallet_address;

const CHUNK_SLOTS: i64 = 1000;
const INTER_CHUNK_PAUSE: Duration = Duration::from_millis(250);

pub struct Reconciler {
    provider: Arc<dyn TransactionProvider>,
    pool: SqlitePool,
    resolver: Arc<TokenMetaResolver>,
    page_limit: usize,
    max_pages: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutcome {
    pub wallet: String,
    pub from_slot: i64,
    pub to_slot: i64,
    pub provider_count: usize,
    pub stored_count: usize,
    pub missing_signatures: Vec<String>,
    pub repaired: usize,
    pub signature_set_hash: String,
    pub ok: bool,
}

impl Reconciler {
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

    pub async fn reconcile_slot_range(
        &self,
        wallet: &str,
        from_slot: i64,
        to_slot: i64,
    ) -> Result<ReconcileOutcome, IndexerError> {
        validate_wallet_address(wallet)?;

        match self.run_range(wallet, from_slot, to_slot).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                // Record the failed pass where the store still answers.
                let audit = ReconcileAudit {
                    wallet: wallet.to_string(),
                    from_slot,
                    to_slot,
                    count_raw: 0,
                    count_wallet_tx: 0,
                    signature_set_hash: String::new(),
                    ok: false,
                    created_at: Utc::now().timestamp(),
                };
                if let Err(audit_err) = reconcile_audit::append(&self.pool, &audit).await {
                    warn!("failed to record failed reconciliation: {}", audit_err);
                }
                Err(e)
            }
        }
    }

    async fn run_range(
        &self,
        wallet: &str,
        from_slot: i64,
        to_slot: i64,
    ) -> Result<ReconcileOutcome, IndexerError> {
        let window_items = self.fetch_window(wallet, from_slot, to_slot).await?;
        let provider_sigs: BTreeSet<String> = window_items
            .iter()
            .map(|tx| tx.signature.clone())
            .collect();

        let stored: BTreeSet<String> =
            raw_transaction::signatures_in_slot_range(&self.pool, from_slot, to_slot)
                .await?
                .into_iter()
                .collect();

        let missing: Vec<String> = provider_sigs.difference(&stored).cloned().collect();
        let mut repaired = 0;

        if !missing.is_empty() {
            info!(
                wallet,
                from_slot,
                to_slot,
                missing = missing.len(),
                "repairing missing transactions"
            );
            let to_repair: Vec<EnhancedTransaction> = window_items
                .iter()
                .filter(|tx| missing.contains(&tx.signature))
                .cloned()
                .collect();
            ingest_items(&self.pool, &self.resolver, wallet, &to_repair).await?;
            repaired = to_repair.len();
        }

        let stored_after: BTreeSet<String> =
            raw_transaction::signatures_in_slot_range(&self.pool, from_slot, to_slot)
                .await?
                .into_iter()
                .collect();
        let missing_after: Vec<String> =
            provider_sigs.difference(&stored_after).cloned().collect();

        let hash_provider = signature_set_hash(&provider_sigs);
        let hash_stored = signature_set_hash(&stored_after);
        let ok = hash_provider == hash_stored && missing_after.is_empty();

        let count_wallet_tx =
            wallet_event::count_in_slot_range(&self.pool, wallet, from_slot, to_slot).await?;

        let audit = ReconcileAudit {
            wallet: wallet.to_string(),
            from_slot,
            to_slot,
            count_raw: stored_after.len() as i64,
            count_wallet_tx,
            signature_set_hash: hash_stored.clone(),
            ok,
            created_at: Utc::now().timestamp(),
        };
        reconcile_audit::append(&self.pool, &audit).await?;

        debug!(wallet, from_slot, to_slot, ok, "reconciliation recorded");

        Ok(ReconcileOutcome {
            wallet: wallet.to_string(),
            from_slot,
            to_slot,
            provider_count: provider_sigs.len(),
            stored_count: stored_after.len(),
            missing_signatures: missing,
            repaired,
            signature_set_hash: hash_stored,
            ok,
        })
    }

    /// Walk the verified window in fixed-size chunks, pausing between chunks
    /// so one wallet cannot starve other tenants of provider budget.
    pub async fn reconcile_recent_slots(
        &self,
        wallet: &str,
        window_size: i64,
    ) -> Result<Vec<ReconcileOutcome>, IndexerError> {
        validate_wallet_address(wallet)?;

        let state = sync_state::load(&self.pool, wallet).await?;
        let verified_slot = state.and_then(|s| s.verified_slot).ok_or_else(|| {
            IndexerError::PreconditionFailed(format!(
                "no verified slot for {wallet}: run backfill and tail sync first"
            ))
        })?;

        let from = (verified_slot - window_size).max(0);
        let mut outcomes = Vec::new();
        let mut chunk_start = from;

        while chunk_start <= verified_slot {
            let chunk_end = (chunk_start + CHUNK_SLOTS - 1).min(verified_slot);
            outcomes.push(
                self.reconcile_slot_range(wallet, chunk_start, chunk_end)
                    .await?,
            );
            chunk_start = chunk_end + 1;
            if chunk_start <= verified_slot {
                tokio::time::sleep(INTER_CHUNK_PAUSE).await;
            }
        }

        Ok(outcomes)
    }

    /// Page backward until a page dips below the window's lower bound,
    /// keeping only items inside `[from_slot, to_slot]`.
    async fn fetch_window(
        &self,
        wallet: &str,
        from_slot: i64,
        to_slot: i64,
    ) -> Result<Vec<EnhancedTransaction>, IndexerError> {
        let mut kept = Vec::new();
        let mut before: Option<String> = None;

        for _ in 0..self.max_pages {
            let page = self
                .provider
                .fetch_page(wallet, before.as_deref(), self.page_limit)
                .await?;
            if page.items.is_empty() {
                break;
            }

            let page_min = page.items.iter().map(|t| t.slot).min().unwrap_or(0);
            kept.extend(
                page.items
                    .iter()
                    .filter(|tx| tx.slot >= from_slot && tx.slot <= to_slot)
                    .cloned(),
            );

            if page_min < from_slot {
                break;
            }
            match page.next_before {
                Some(next) => before = Some(next),
                None => break,
            }
        }

        Ok(kept)
    }
}

fn signature_set_hash(signatures: &BTreeSet<String>) -> String {
    let joined: String = signatures.iter().map(String::as_str).collect();
    sha256(joined.as_bytes()).to_string()
}

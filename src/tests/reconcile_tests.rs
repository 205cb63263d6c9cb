use std::sync::Arc;

use crate::db::{raw_transaction, reconcile_audit, sync_state};
use crate::error::IndexerError;
use crate::provider::ProviderError;
use crate::reconcile::Reconciler;
use crate::tests::support::*;

fn reconciler(provider: Arc<MockProvider>, pool: sqlx::SqlitePool) -> Reconciler {
    let resolver = test_resolver(pool.clone());
    Reconciler::new(provider, pool, resolver, 100, 1000)
}

fn window_page() -> Vec<Result<crate::provider::models::ProviderPage, ProviderError>> {
    vec![
        Ok(page(
            vec![
                incoming_tx("sig3", 1002, 102),
                incoming_tx("sig2", 1001, 101),
                incoming_tx("sig1", 1000, 100),
            ],
            Some("sig1"),
        )),
        Ok(page(vec![], None)),
    ]
}

async fn preload(pool: &sqlx::SqlitePool, signatures: &[(&str, i64)]) {
    let raw: Vec<_> = signatures
        .iter()
        .map(|(sig, slot)| crate::models::RawTransaction {
            signature: sig.to_string(),
            slot: *slot,
            block_time: Some(*slot - 900),
            payload: "{}".to_string(),
        })
        .collect();
    raw_transaction::upsert_raw_transactions(pool, &raw).await.unwrap();
}

#[tokio::test]
async fn detects_and_repairs_a_missing_signature() {
    let pool = memory_pool().await;
    preload(&pool, &[("sig1", 1000), ("sig2", 1001)]).await;

    let provider = MockProvider::new(window_page());
    let rec = reconciler(provider, pool.clone());

    let outcome = rec.reconcile_slot_range(WALLET, 1000, 1002).await.unwrap();

    assert_eq!(outcome.missing_signatures, vec!["sig3".to_string()]);
    assert_eq!(outcome.repaired, 1);
    assert_eq!(outcome.provider_count, 3);
    assert_eq!(outcome.stored_count, 3);
    assert!(outcome.ok);
    assert!(raw_transaction::exists(&pool, "sig3").await.unwrap());

    let audits = reconcile_audit::list_for_wallet(&pool, WALLET).await.unwrap();
    assert_eq!(audits.len(), 1);
    assert!(audits[0].ok);
    assert_eq!(audits[0].count_raw, 3);
    assert_eq!(audits[0].signature_set_hash, outcome.signature_set_hash);
}

#[tokio::test]
async fn reconcile_is_idempotent() {
    let pool = memory_pool().await;
    preload(&pool, &[("sig1", 1000), ("sig2", 1001), ("sig3", 1002)]).await;

    for _ in 0..2 {
        let provider = MockProvider::new(window_page());
        let rec = reconciler(provider, pool.clone());
        let outcome = rec.reconcile_slot_range(WALLET, 1000, 1002).await.unwrap();
        assert!(outcome.ok);
        assert!(outcome.missing_signatures.is_empty());
    }

    let audits = reconcile_audit::list_for_wallet(&pool, WALLET).await.unwrap();
    assert_eq!(audits.len(), 2);
    assert_eq!(audits[0].signature_set_hash, audits[1].signature_set_hash);
}

#[tokio::test]
async fn extra_stored_signature_fails_the_check() {
    let pool = memory_pool().await;
    preload(
        &pool,
        &[("sig1", 1000), ("sig2", 1001), ("sig3", 1002), ("phantom", 1001)],
    )
    .await;

    let provider = MockProvider::new(window_page());
    let rec = reconciler(provider, pool.clone());

    let outcome = rec.reconcile_slot_range(WALLET, 1000, 1002).await.unwrap();
    assert!(!outcome.ok);
    assert!(outcome.missing_signatures.is_empty());

    let audits = reconcile_audit::list_for_wallet(&pool, WALLET).await.unwrap();
    assert!(!audits[0].ok);
}

#[tokio::test]
async fn provider_failure_still_records_an_audit() {
    let pool = memory_pool().await;
    let provider = MockProvider::new(vec![Err(ProviderError::Server(503))]);
    let rec = reconciler(provider, pool.clone());

    let err = rec.reconcile_slot_range(WALLET, 1000, 1002).await.unwrap_err();
    assert!(matches!(err, IndexerError::UpstreamTransient(_)));

    let audits = reconcile_audit::list_for_wallet(&pool, WALLET).await.unwrap();
    assert_eq!(audits.len(), 1);
    assert!(!audits[0].ok);
}

#[tokio::test]
async fn recent_slots_require_a_verified_slot() {
    let pool = memory_pool().await;
    let provider = MockProvider::new(vec![]);
    let rec = reconciler(provider, pool);

    let err = rec.reconcile_recent_slots(WALLET, 10_000).await.unwrap_err();
    assert!(matches!(err, IndexerError::PreconditionFailed(_)));
}

#[tokio::test]
async fn recent_slots_walk_the_window_in_chunks() {
    let pool = memory_pool().await;
    sync_state::load_or_create(&pool, WALLET).await.unwrap();
    sync_state::set_verified_slot(&pool, WALLET, 1500).await.unwrap();

    // The provider script is exhausted immediately; every chunk sees an
    // empty window that trivially agrees with the store.
    let provider = MockProvider::new(vec![]);
    let rec = reconciler(provider, pool.clone());

    let outcomes = rec.reconcile_recent_slots(WALLET, 2000).await.unwrap();

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].from_slot, 0);
    assert_eq!(outcomes[0].to_slot, 999);
    assert_eq!(outcomes[1].from_slot, 1000);
    assert_eq!(outcomes[1].to_slot, 1500);
    assert!(outcomes.iter().all(|o| o.ok));

    let audits = reconcile_audit::list_for_wallet(&pool, WALLET).await.unwrap();
    assert_eq!(audits.len(), 2);
}

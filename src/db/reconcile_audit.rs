use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};

use crate::models::ReconcileAudit;

/// Append-only; audits are never updated or deleted.
pub async fn append(pool: &Pool<Sqlite>, audit: &ReconcileAudit) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO reconcile_audits
            (wallet, from_slot, to_slot, count_raw, count_wallet_tx, signature_set_hash, ok, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&audit.wallet)
    .bind(audit.from_slot)
    .bind(audit.to_slot)
    .bind(audit.count_raw)
    .bind(audit.count_wallet_tx)
    .bind(&audit.signature_set_hash)
    .bind(audit.ok)
    .bind(audit.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_for_wallet(
    pool: &Pool<Sqlite>,
    wallet: &str,
) -> Result<Vec<ReconcileAudit>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT * FROM reconcile_audits WHERE wallet = ? ORDER BY id ASC",
    )
    .bind(wallet)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(row_to_audit).collect())
}

fn row_to_audit(row: &SqliteRow) -> ReconcileAudit {
    ReconcileAudit {
        wallet: row.get("wallet"),
        from_slot: row.get("from_slot"),
        to_slot: row.get("to_slot"),
        count_raw: row.get("count_raw"),
        count_wallet_tx: row.get("count_wallet_tx"),
        signature_set_hash: row.get("signature_set_hash"),
        ok: row.get("ok"),
        created_at: row.get("created_at"),
    }
}

use chrono::Utc;
use sqlx::{Pool, Row, Sqlite};

use crate::models::RawTransaction;

/// Batch upsert keyed by signature. Re-ingesting a signature refreshes the
/// payload and `updated_at` but never produces a second row.
pub async fn upsert_raw_transactions(
    pool: &Pool<Sqlite>,
    transactions: &[RawTransaction],
) -> Result<(), sqlx::Error> {
    if transactions.is_empty() {
        return Ok(());
    }

    let now = Utc::now().timestamp();
    let mut tx = pool.begin().await?;

    for raw in transactions {
        sqlx::query(
            r#"
            INSERT INTO raw_transactions (signature, slot, block_time, payload, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(signature) DO UPDATE SET
                slot = excluded.slot,
                block_time = excluded.block_time,
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&raw.signature)
        .bind(raw.slot)
        .bind(raw.block_time)
        .bind(&raw.payload)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn exists(pool: &Pool<Sqlite>, signature: &str) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query("SELECT COUNT(*) FROM raw_transactions WHERE signature = ?")
        .bind(signature)
        .fetch_one(pool)
        .await?
        .get(0);
    Ok(count > 0)
}

pub async fn count(pool: &Pool<Sqlite>) -> Result<i64, sqlx::Error> {
    let count: i64 = sqlx::query("SELECT COUNT(*) FROM raw_transactions")
        .fetch_one(pool)
        .await?
        .get(0);
    Ok(count)
}

pub async fn signatures_in_slot_range(
    pool: &Pool<Sqlite>,
    from_slot: i64,
    to_slot: i64,
) -> Result<Vec<String>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT signature FROM raw_transactions
         WHERE slot >= ? AND slot <= ?
         ORDER BY slot ASC",
    )
    .bind(from_slot)
    .bind(to_slot)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(|row| row.get("signature")).collect())
}

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};

use crate::models::SyncState;

pub async fn load(pool: &Pool<Sqlite>, wallet: &str) -> Result<Option<SyncState>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM sync_state WHERE wallet = ?")
        .bind(wallet)
        .fetch_optional(pool)
        .await?;

    Ok(row.as_ref().map(row_to_state))
}

pub async fn load_or_create(pool: &Pool<Sqlite>, wallet: &str) -> Result<SyncState, sqlx::Error> {
    if let Some(state) = load(pool, wallet).await? {
        return Ok(state);
    }

    let now = Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO sync_state (wallet, last_before, verified_slot, full_scan_at, created_at, updated_at)
        VALUES (?, NULL, NULL, NULL, ?, ?)
        ON CONFLICT(wallet) DO NOTHING
        "#,
    )
    .bind(wallet)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(SyncState {
        wallet: wallet.to_string(),
        last_before: None,
        verified_slot: None,
        full_scan_at: None,
        created_at: now,
        updated_at: now,
    })
}

pub async fn set_last_before(
    pool: &Pool<Sqlite>,
    wallet: &str,
    last_before: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE sync_state SET last_before = ?, updated_at = ? WHERE wallet = ?")
        .bind(last_before)
        .bind(Utc::now().timestamp())
        .bind(wallet)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_full_scan_at(
    pool: &Pool<Sqlite>,
    wallet: &str,
    full_scan_at: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE sync_state SET full_scan_at = ?, updated_at = ? WHERE wallet = ?")
        .bind(full_scan_at)
        .bind(Utc::now().timestamp())
        .bind(wallet)
        .execute(pool)
        .await?;
    Ok(())
}

/// Advance the tail watermark; never moves backwards.
pub async fn set_verified_slot(
    pool: &Pool<Sqlite>,
    wallet: &str,
    verified_slot: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE sync_state
         SET verified_slot = MAX(COALESCE(verified_slot, 0), ?), updated_at = ?
         WHERE wallet = ?",
    )
    .bind(verified_slot)
    .bind(Utc::now().timestamp())
    .bind(wallet)
    .execute(pool)
    .await?;
    Ok(())
}

fn row_to_state(row: &SqliteRow) -> SyncState {
    SyncState {
        wallet: row.get("wallet"),
        last_before: row.get("last_before"),
        verified_slot: row.get("verified_slot"),
        full_scan_at: row.get("full_scan_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

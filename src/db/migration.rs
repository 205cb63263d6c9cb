use sqlx::SqlitePool;
use tracing::info;

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    info!("Running database migrations...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS raw_transactions (
            signature TEXT PRIMARY KEY,
            slot INTEGER NOT NULL,
            block_time INTEGER,
            payload TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS wallet_events (
            wallet TEXT NOT NULL,
            signature TEXT NOT NULL,
            event_index INTEGER NOT NULL,
            slot INTEGER NOT NULL,
            block_time INTEGER NOT NULL,
            program TEXT,
            side TEXT NOT NULL,
            direction TEXT NOT NULL,
            token_mint TEXT NOT NULL,
            token_symbol TEXT NOT NULL,
            token_decimals INTEGER NOT NULL,
            amount_raw TEXT NOT NULL,
            amount_ui TEXT NOT NULL,
            amount_usd TEXT,
            price_usd_at_tx TEXT,
            link_id TEXT,
            fee_base_units INTEGER,
            metadata TEXT,
            PRIMARY KEY (wallet, signature, event_index)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS sync_state (
            wallet TEXT PRIMARY KEY,
            last_before TEXT,
            verified_slot INTEGER,
            full_scan_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS reconcile_audits (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            wallet TEXT NOT NULL,
            from_slot INTEGER NOT NULL,
            to_slot INTEGER NOT NULL,
            count_raw INTEGER NOT NULL,
            count_wallet_tx INTEGER NOT NULL,
            signature_set_hash TEXT NOT NULL,
            ok BOOLEAN NOT NULL,
            created_at INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS token_meta (
            mint TEXT PRIMARY KEY,
            symbol TEXT NOT NULL,
            name TEXT,
            decimals INTEGER NOT NULL,
            source TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS candles (
            mint TEXT NOT NULL,
            resolution TEXT NOT NULL,
            t INTEGER NOT NULL,
            open TEXT NOT NULL,
            high TEXT NOT NULL,
            low TEXT NOT NULL,
            close TEXT NOT NULL,
            PRIMARY KEY (mint, resolution, t)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_raw_transactions_slot
         ON raw_transactions(slot)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_wallet_events_wallet_slot
         ON wallet_events(wallet, slot)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_wallet_events_wallet_time
         ON wallet_events(wallet, block_time)",
    )
    .execute(pool)
    .await?;

    info!("Database migrations completed successfully");
    Ok(())
}

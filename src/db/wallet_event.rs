use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;

use crate::models::{Direction, Side, WalletEvent};

/// Batch upsert keyed by `(wallet, signature, event_index)`.
pub async fn upsert_wallet_events(
    pool: &Pool<Sqlite>,
    events: &[WalletEvent],
) -> Result<(), sqlx::Error> {
    if events.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;

    for event in events {
        sqlx::query(
            r#"
            INSERT INTO wallet_events
                (wallet, signature, event_index, slot, block_time, program, side, direction,
                 token_mint, token_symbol, token_decimals, amount_raw, amount_ui, amount_usd,
                 price_usd_at_tx, link_id, fee_base_units, metadata)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(wallet, signature, event_index) DO UPDATE SET
                slot = excluded.slot,
                block_time = excluded.block_time,
                program = excluded.program,
                side = excluded.side,
                direction = excluded.direction,
                token_mint = excluded.token_mint,
                token_symbol = excluded.token_symbol,
                token_decimals = excluded.token_decimals,
                amount_raw = excluded.amount_raw,
                amount_ui = excluded.amount_ui,
                amount_usd = excluded.amount_usd,
                price_usd_at_tx = excluded.price_usd_at_tx,
                link_id = excluded.link_id,
                fee_base_units = excluded.fee_base_units,
                metadata = excluded.metadata
            "#,
        )
        .bind(&event.wallet)
        .bind(&event.signature)
        .bind(event.event_index)
        .bind(event.slot)
        .bind(event.block_time)
        .bind(&event.program)
        .bind(event.side.as_str())
        .bind(event.direction.as_str())
        .bind(&event.token_mint)
        .bind(&event.token_symbol)
        .bind(event.token_decimals as i64)
        .bind(&event.amount_raw)
        .bind(event.amount_ui.to_string())
        .bind(event.amount_usd.map(|d| d.to_string()))
        .bind(event.price_usd_at_tx.map(|d| d.to_string()))
        .bind(&event.link_id)
        .bind(event.fee_base_units)
        .bind(&event.metadata)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Full ledger for one wallet in reconstruction order:
/// ascending block time, ties broken by event index.
pub async fn events_for_wallet(
    pool: &Pool<Sqlite>,
    wallet: &str,
) -> Result<Vec<WalletEvent>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT * FROM wallet_events
         WHERE wallet = ?
         ORDER BY block_time ASC, event_index ASC",
    )
    .bind(wallet)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(row_to_event).collect())
}

pub async fn count_for_wallet(pool: &Pool<Sqlite>, wallet: &str) -> Result<i64, sqlx::Error> {
    let count: i64 = sqlx::query("SELECT COUNT(*) FROM wallet_events WHERE wallet = ?")
        .bind(wallet)
        .fetch_one(pool)
        .await?
        .get(0);
    Ok(count)
}

pub async fn count_in_slot_range(
    pool: &Pool<Sqlite>,
    wallet: &str,
    from_slot: i64,
    to_slot: i64,
) -> Result<i64, sqlx::Error> {
    let count: i64 = sqlx::query(
        "SELECT COUNT(*) FROM wallet_events
         WHERE wallet = ? AND slot >= ? AND slot <= ?",
    )
    .bind(wallet)
    .bind(from_slot)
    .bind(to_slot)
    .fetch_one(pool)
    .await?
    .get(0);
    Ok(count)
}

fn row_to_event(row: &SqliteRow) -> WalletEvent {
    let amount_ui: String = row.get("amount_ui");
    let amount_usd: Option<String> = row.get("amount_usd");
    let price_usd_at_tx: Option<String> = row.get("price_usd_at_tx");
    let side: String = row.get("side");
    let direction: String = row.get("direction");

    WalletEvent {
        wallet: row.get("wallet"),
        signature: row.get("signature"),
        event_index: row.get("event_index"),
        slot: row.get("slot"),
        block_time: row.get("block_time"),
        program: row.get("program"),
        side: Side::parse(&side),
        direction: Direction::parse(&direction),
        token_mint: row.get("token_mint"),
        token_symbol: row.get("token_symbol"),
        token_decimals: row.get::<i64, _>("token_decimals") as u8,
        amount_raw: row.get("amount_raw"),
        amount_ui: Decimal::from_str(&amount_ui).unwrap_or_default(),
        amount_usd: amount_usd.and_then(|s| Decimal::from_str(&s).ok()),
        price_usd_at_tx: price_usd_at_tx.and_then(|s| Decimal::from_str(&s).ok()),
        link_id: row.get("link_id"),
        fee_base_units: row.get("fee_base_units"),
        metadata: row.get("metadata"),
    }
}

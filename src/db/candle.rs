use rust_decimal::Decimal;
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;

use crate::models::Candle;

pub async fn upsert_many(
    pool: &Pool<Sqlite>,
    mint: &str,
    resolution: &str,
    candles: &[Candle],
) -> Result<(), sqlx::Error> {
    if candles.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;

    for candle in candles {
        sqlx::query(
            r#"
            INSERT INTO candles (mint, resolution, t, open, high, low, close)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(mint, resolution, t) DO UPDATE SET
                open = excluded.open,
                high = excluded.high,
                low = excluded.low,
                close = excluded.close
            "#,
        )
        .bind(mint)
        .bind(resolution)
        .bind(candle.t)
        .bind(candle.open.to_string())
        .bind(candle.high.to_string())
        .bind(candle.low.to_string())
        .bind(candle.close.to_string())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn get_range(
    pool: &Pool<Sqlite>,
    mint: &str,
    resolution: &str,
    start: i64,
    end: i64,
) -> Result<Vec<Candle>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT t, open, high, low, close FROM candles
         WHERE mint = ? AND resolution = ? AND t >= ? AND t <= ?
         ORDER BY t ASC",
    )
    .bind(mint)
    .bind(resolution)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let open: String = row.get("open");
            let high: String = row.get("high");
            let low: String = row.get("low");
            let close: String = row.get("close");
            Candle {
                t: row.get("t"),
                open: Decimal::from_str(&open).unwrap_or_default(),
                high: Decimal::from_str(&high).unwrap_or_default(),
                low: Decimal::from_str(&low).unwrap_or_default(),
                close: Decimal::from_str(&close).unwrap_or_default(),
            }
        })
        .collect())
}

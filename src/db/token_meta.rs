use chrono::Utc;
use sqlx::{Pool, Row, Sqlite};
use std::collections::HashMap;

use crate::models::{MetaSourceKind, TokenMeta};

pub async fn upsert(pool: &Pool<Sqlite>, meta: &TokenMeta) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO token_meta (mint, symbol, name, decimals, source, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(mint) DO UPDATE SET
            symbol = excluded.symbol,
            name = excluded.name,
            decimals = excluded.decimals,
            source = excluded.source,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&meta.mint)
    .bind(&meta.symbol)
    .bind(&meta.name)
    .bind(meta.decimals as i64)
    .bind(meta.source.as_str())
    .bind(Utc::now().timestamp())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_many(
    pool: &Pool<Sqlite>,
    mints: &[String],
) -> Result<HashMap<String, TokenMeta>, sqlx::Error> {
    let mut found = HashMap::new();

    for mint in mints {
        let row = sqlx::query("SELECT * FROM token_meta WHERE mint = ?")
            .bind(mint)
            .fetch_optional(pool)
            .await?;

        if let Some(row) = row {
            let source: String = row.get("source");
            found.insert(
                mint.clone(),
                TokenMeta {
                    mint: row.get("mint"),
                    symbol: row.get("symbol"),
                    name: row.get("name"),
                    decimals: row.get::<i64, _>("decimals") as u8,
                    source: MetaSourceKind::parse(&source),
                },
            );
        }
    }

    Ok(found)
}

// FIFO position reconstruction over the canonical event ledger. Lots live
// only for the duration of one run; nothing here is persisted.

use chrono::Utc;
use once_cell::sync::Lazy;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::wallet_event;
use crate::error::IndexerError;
use crate::ingest::normalizer::{NATIVE_DECIMALS, NATIVE_MINT};
use crate::models::{Side, WalletEvent};
use crate::oracle::{PriceOracle, Resolution};
use crate::validation::validate_wallet_address;

/// Quantities at or below this are considered fully consumed.
static QTY_EPSILON: Lazy<Decimal> = Lazy::new(|| Decimal::new(1, 6));

/// Windows up to 60 days use hourly candles; longer ones use daily.
const HOURLY_WINDOW_SECS: i64 = 60 * 86_400;

#[derive(Debug, Clone, Serialize)]
pub struct MatchedSell {
    pub time: i64,
    pub qty: Decimal,
    pub proceeds_usd: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct Lot {
    pub id: String,
    pub token_mint: String,
    pub buy_time: i64,
    pub buy_qty: Decimal,
    pub buy_price_usd: Option<Decimal>,
    pub buy_cost_usd: Option<Decimal>,
    pub remaining_qty: Decimal,
    pub matched_sells: Vec<MatchedSell>,
    pub realized_usd: Decimal,
    pub peak_timestamp: Option<i64>,
    pub peak_price_usd: Option<Decimal>,
    pub peak_potential_usd: Decimal,
    pub regret_gap_usd: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPosition {
    pub mint: String,
    pub symbol: String,
    pub lots: Vec<Lot>,
    pub realized_usd: Decimal,
    pub peak_potential_usd: Decimal,
    pub regret_gap_usd: Decimal,
    pub remaining_qty: Decimal,
    pub current_price_usd: Option<Decimal>,
    pub current_value_usd: Decimal,
}

/// Wallet-level rollup. Totals are the only place decimals are collapsed
/// to floats.
#[derive(Debug, Clone, Serialize)]
pub struct PositionSummary {
    pub wallet: String,
    pub generated_at: i64,
    pub tokens: Vec<TokenPosition>,
    pub realized_usd: f64,
    pub peak_potential_usd: f64,
    pub regret_gap_usd: f64,
    pub open_positions_usd: f64,
}

pub struct Reconstructor {
    pool: SqlitePool,
    oracle: Arc<dyn PriceOracle>,
}

impl Reconstructor {
    pub fn new(pool: SqlitePool, oracle: Arc<dyn PriceOracle>) -> Self {
        Self { pool, oracle }
    }

    pub async fn analyze(&self, wallet: &str) -> Result<PositionSummary, IndexerError> {
        self.analyze_at(wallet, Utc::now().timestamp()).await
    }

    pub async fn analyze_at(
        &self,
        wallet: &str,
        as_of: i64,
    ) -> Result<PositionSummary, IndexerError> {
        validate_wallet_address(wallet)?;

        let events = wallet_event::events_for_wallet(&self.pool, wallet).await?;
        info!(wallet, events = events.len(), "reconstructing positions");

        let mut by_mint: BTreeMap<String, Vec<WalletEvent>> = BTreeMap::new();
        for event in events {
            if matches!(event.side, Side::Buy | Side::Sell) {
                by_mint.entry(event.token_mint.clone()).or_default().push(event);
            }
        }

        let mut tokens = Vec::new();
        let mut realized_total = Decimal::ZERO;
        let mut peak_total = Decimal::ZERO;
        let mut regret_total = Decimal::ZERO;
        let mut open_total = Decimal::ZERO;

        for (mint, events) in by_mint {
            let symbol = events
                .first()
                .map(|e| e.token_symbol.clone())
                .unwrap_or_default();
            let mut lots = self.match_lots(&mint, &events).await;

            let remaining_qty: Decimal = lots.iter().map(|l| l.remaining_qty).sum();
            let current_price = if remaining_qty > *QTY_EPSILON {
                self.oracle.current_price_usd(&mint).await.unwrap_or(None)
            } else {
                None
            };

            for lot in &mut lots {
                self.annotate_peak(&mint, lot, current_price, as_of).await;
            }

            let realized: Decimal = lots.iter().map(|l| l.realized_usd).sum();
            let peak: Decimal = lots.iter().map(|l| l.peak_potential_usd).sum();
            let regret: Decimal = lots.iter().map(|l| l.regret_gap_usd).sum();
            let current_value = remaining_qty * current_price.unwrap_or(Decimal::ZERO);

            realized_total += realized;
            peak_total += peak;
            regret_total += regret;
            open_total += current_value;

            tokens.push(TokenPosition {
                mint,
                symbol,
                lots,
                realized_usd: realized,
                peak_potential_usd: peak,
                regret_gap_usd: regret,
                remaining_qty,
                current_price_usd: current_price,
                current_value_usd: current_value,
            });
        }

        Ok(PositionSummary {
            wallet: wallet.to_string(),
            generated_at: as_of,
            tokens,
            realized_usd: realized_total.to_f64().unwrap_or(0.0),
            peak_potential_usd: peak_total.to_f64().unwrap_or(0.0),
            regret_gap_usd: regret_total.to_f64().unwrap_or(0.0),
            open_positions_usd: open_total.to_f64().unwrap_or(0.0),
        })
    }

    /// FIFO matching for one token. SELL quantity that exceeds the open
    /// lots is dropped: a ledger that starts mid-life has sells with no
    /// recorded acquisition.
    async fn match_lots(&self, mint: &str, events: &[WalletEvent]) -> Vec<Lot> {
        let mut open: VecDeque<Lot> = VecDeque::new();
        let mut closed: Vec<Lot> = Vec::new();

        for event in events {
            let ts = event.block_time;
            match event.side {
                Side::Buy => {
                    let qty = event.amount_ui.abs();
                    if qty.is_zero() {
                        continue;
                    }
                    let price = self.price_at_or_none(mint, ts).await;
                    open.push_back(Lot {
                        id: format!("{}:{}", event.signature, ts),
                        token_mint: mint.to_string(),
                        buy_time: ts,
                        buy_qty: qty,
                        buy_price_usd: price,
                        buy_cost_usd: price.map(|p| p * qty),
                        remaining_qty: qty,
                        matched_sells: Vec::new(),
                        realized_usd: Decimal::ZERO,
                        peak_timestamp: None,
                        peak_price_usd: None,
                        peak_potential_usd: Decimal::ZERO,
                        regret_gap_usd: Decimal::ZERO,
                    });
                }
                Side::Sell => {
                    let mut need = event.amount_ui.abs();
                    if need.is_zero() {
                        continue;
                    }
                    let sell_price = self
                        .price_at_or_none(mint, ts)
                        .await
                        .unwrap_or(Decimal::ZERO);
                    let fee_usd = self.fee_usd(event).await;

                    while need > Decimal::ZERO {
                        let Some(lot) = open.front_mut() else {
                            debug!(mint, signature = %event.signature, dropped = %need,
                                   "sell exceeds open lots; dropping remainder");
                            break;
                        };
                        let take = need.min(lot.remaining_qty);
                        let proceeds = take * sell_price - fee_usd;
                        lot.matched_sells.push(MatchedSell {
                            time: ts,
                            qty: take,
                            proceeds_usd: proceeds,
                        });
                        lot.realized_usd += proceeds;
                        lot.remaining_qty -= take;
                        need -= take;

                        if lot.remaining_qty <= *QTY_EPSILON {
                            if let Some(done) = open.pop_front() {
                                closed.push(done);
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        closed.extend(open);
        closed.sort_by_key(|l| l.buy_time);
        closed
    }

    /// Peak-potential and regret-gap for one lot. Oracle failures are
    /// neutral: the lot keeps `peak_potential = realized` and zero regret.
    async fn annotate_peak(
        &self,
        mint: &str,
        lot: &mut Lot,
        current_price: Option<Decimal>,
        as_of: i64,
    ) {
        let end = lot
            .matched_sells
            .iter()
            .map(|s| s.time)
            .max()
            .unwrap_or(as_of);
        let resolution = if end - lot.buy_time <= HOURLY_WINDOW_SECS {
            Resolution::OneHour
        } else {
            Resolution::OneDay
        };

        let candles = self
            .oracle
            .get_candles(mint, lot.buy_time, end, resolution)
            .await
            .unwrap_or_default();

        match candles.iter().max_by_key(|c| c.high) {
            Some(peak) => {
                lot.peak_timestamp = Some(peak.t);
                lot.peak_price_usd = Some(peak.high);
                lot.peak_potential_usd = lot.buy_qty * peak.high;
            }
            None => {
                lot.peak_timestamp = None;
                lot.peak_price_usd = None;
                lot.peak_potential_usd = lot.realized_usd;
            }
        }

        let held_value = if lot.remaining_qty > Decimal::ZERO {
            lot.remaining_qty * current_price.unwrap_or(Decimal::ZERO)
        } else {
            Decimal::ZERO
        };
        lot.regret_gap_usd =
            (lot.peak_potential_usd - (lot.realized_usd + held_value)).max(Decimal::ZERO);
    }

    async fn price_at_or_none(&self, mint: &str, ts: i64) -> Option<Decimal> {
        self.oracle.price_at(mint, ts).await.unwrap_or(None)
    }

    /// Convert an event's attributed fee to USD via the native token price
    /// at the event's timestamp.
    async fn fee_usd(&self, event: &WalletEvent) -> Decimal {
        let Some(fee) = event.fee_base_units else {
            return Decimal::ZERO;
        };
        if fee <= 0 {
            return Decimal::ZERO;
        }
        let native_price = self
            .price_at_or_none(NATIVE_MINT, event.block_time)
            .await
            .unwrap_or(Decimal::ZERO);
        let fee_native =
            Decimal::from(fee as u64) / Decimal::from(10u64.pow(NATIVE_DECIMALS as u32));
        fee_native * native_price
    }
}

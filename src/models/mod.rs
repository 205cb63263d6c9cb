// Core entities shared across the ingestion, reconciliation and
// reconstruction layers. Rows are mapped to/from SQLite by hand in the
// db modules; decimal amounts are persisted as strings.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A provider transaction as stored: the typed key fields plus the full
/// serialized payload for later re-normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub signature: String,
    pub slot: i64,
    pub block_time: Option<i64>,
    /// Opaque provider JSON, stored verbatim.
    pub payload: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
    Swap,
    Transfer,
    Mint,
    Burn,
    Wrap,
    Unwrap,
    Unknown,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
            Side::Swap => "SWAP",
            Side::Transfer => "TRANSFER",
            Side::Mint => "MINT",
            Side::Burn => "BURN",
            Side::Wrap => "WRAP",
            Side::Unwrap => "UNWRAP",
            Side::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "BUY" => Side::Buy,
            "SELL" => Side::Sell,
            "SWAP" => Side::Swap,
            "TRANSFER" => Side::Transfer,
            "MINT" => Side::Mint,
            "BURN" => Side::Burn,
            "WRAP" => Side::Wrap,
            "UNWRAP" => Side::Unwrap,
            _ => Side::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    In,
    Out,
    SelfTransfer,
    None,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
            Direction::SelfTransfer => "SELF",
            Direction::None => "N/A",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "IN" => Direction::In,
            "OUT" => Direction::Out,
            "SELF" => Direction::SelfTransfer,
            _ => Direction::None,
        }
    }
}

/// One canonical ledger entry for a wallet. Identified by
/// `(wallet, signature, event_index)`; indices are dense and ascending
/// within the normalization of one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletEvent {
    pub wallet: String,
    pub signature: String,
    pub event_index: i64,
    pub slot: i64,
    pub block_time: i64,
    pub program: Option<String>,
    pub side: Side,
    pub direction: Direction,
    pub token_mint: String,
    pub token_symbol: String,
    pub token_decimals: u8,
    /// Signed amount in base units, as a decimal string.
    pub amount_raw: String,
    /// Signed amount in UI units.
    pub amount_ui: Decimal,
    pub amount_usd: Option<Decimal>,
    pub price_usd_at_tx: Option<Decimal>,
    /// Shared by the two legs of a detected swap: `"swap:" + signature`.
    pub link_id: Option<String>,
    /// Transaction fee in native base units, attributed per the first-SELL rule.
    pub fee_base_units: Option<i64>,
    pub metadata: Option<String>,
}

/// Per-wallet durable sync cursor and tail watermark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncState {
    pub wallet: String,
    pub last_before: Option<String>,
    pub verified_slot: Option<i64>,
    pub full_scan_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Append-only record of one reconciliation pass over a slot window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileAudit {
    pub wallet: String,
    pub from_slot: i64,
    pub to_slot: i64,
    pub count_raw: i64,
    pub count_wallet_tx: i64,
    pub signature_set_hash: String,
    pub ok: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetaSourceKind {
    Local,
    Helius,
    Jupiter,
    Derived,
}

impl MetaSourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetaSourceKind::Local => "local",
            MetaSourceKind::Helius => "helius",
            MetaSourceKind::Jupiter => "jupiter",
            MetaSourceKind::Derived => "derived",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "local" => MetaSourceKind::Local,
            "helius" => MetaSourceKind::Helius,
            "jupiter" => MetaSourceKind::Jupiter,
            _ => MetaSourceKind::Derived,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenMeta {
    pub mint: String,
    pub symbol: String,
    pub name: Option<String>,
    pub decimals: u8,
    pub source: MetaSourceKind,
}

/// One OHLC candle, keyed by `(mint, resolution, t)` in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub t: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

/// Counters returned by one backfill or tail-sync run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    pub pages_fetched: u32,
    pub raw_tx_count: u64,
    pub wallet_tx_count: u64,
    pub first_slot: Option<i64>,
    pub last_slot: Option<i64>,
    pub retries: u64,
    pub elapsed_ms: u64,
}

impl IngestStats {
    /// Fold one page's slot bounds into the running bounds: `first_slot`
    /// tracks the highest slot seen, `last_slot` the lowest.
    pub fn observe_slots(&mut self, page_min: i64, page_max: i64) {
        self.first_slot = Some(match self.first_slot {
            Some(s) => s.max(page_max),
            None => page_max,
        });
        self.last_slot = Some(match self.last_slot {
            Some(s) => s.min(page_min),
            None => page_min,
        });
    }
}

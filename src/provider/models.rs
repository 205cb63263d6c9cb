// Lenient schemas for the enhanced-transactions API. Unknown fields are
// preserved in `extra` so the stored payload round-trips, while the typed
// fields feed the normalizer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::RawTransaction;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedTransaction {
    pub signature: String,
    #[serde(default)]
    pub slot: i64,
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// Transaction fee in native base units.
    #[serde(default)]
    pub fee: Option<i64>,
    #[serde(default)]
    pub token_transfers: Vec<TokenTransfer>,
    #[serde(default)]
    pub native_transfers: Vec<NativeTransfer>,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
    #[serde(default)]
    pub events: TxEvents,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransfer {
    #[serde(default)]
    pub mint: Option<String>,
    #[serde(default)]
    pub from_user_account: Option<String>,
    #[serde(default)]
    pub to_user_account: Option<String>,
    /// Already decimals-adjusted by the provider.
    #[serde(default)]
    pub token_amount: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeTransfer {
    #[serde(default)]
    pub from_user_account: Option<String>,
    #[serde(default)]
    pub to_user_account: Option<String>,
    /// Native base units (lamports).
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instruction {
    #[serde(default)]
    pub program_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxEvents {
    #[serde(default)]
    pub swap: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Error envelope the provider returns alongside non-2xx statuses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProviderPage {
    pub items: Vec<EnhancedTransaction>,
    pub next_before: Option<String>,
}

impl EnhancedTransaction {
    pub fn to_raw(&self) -> RawTransaction {
        RawTransaction {
            signature: self.signature.clone(),
            slot: self.slot,
            block_time: self.timestamp,
            payload: serde_json::to_string(self).unwrap_or_default(),
        }
    }
}

pub mod client;
pub mod models;

use async_trait::async_trait;
use thiserror::Error;

pub use client::HeliusProvider;
pub use models::{EnhancedTransaction, Instruction, NativeTransfer, ProviderPage, TokenTransfer};

#[derive(Error, Debug)]
pub enum ProviderError {
    /// The `before` cursor was rejected. Handled by the ingestion driver's
    /// one-shot self-heal; a second occurrence in the same run is fatal.
    #[error("pagination cursor rejected by provider")]
    CursorInvalid,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("rate limited by provider")]
    RateLimited,

    #[error("provider server error: status {0}")]
    Server(u16),

    #[error("provider rejected request: status {status}: {message}")]
    Request { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("undecodable provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited | ProviderError::Server(_) | ProviderError::Network(_)
        )
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::Decode(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

/// One page of a wallet's history, newest-first, plus the cursor for the
/// next (older) page. `next_before` is the signature of the last returned
/// item; `None` means the history is exhausted.
#[async_trait]
pub trait TransactionProvider: Send + Sync {
    async fn fetch_page(
        &self,
        wallet: &str,
        before: Option<&str>,
        limit: usize,
    ) -> Result<ProviderPage, ProviderError>;

    /// Cumulative transient-retry count since construction.
    fn retry_count(&self) -> u64 {
        0
    }
}

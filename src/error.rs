use thiserror::Error;

use crate::provider::ProviderError;
use crate::validation::ValidationError;

/// Top-level failure taxonomy surfaced to callers of the pipeline.
///
/// Locally recovered conditions (unknown prices, unresolved token metadata,
/// the first invalid-cursor occurrence per backfill) never reach this type.
#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("upstream transient failure: {0}")]
    UpstreamTransient(String),

    #[error("upstream rejected the request: {0}")]
    UpstreamPermanent(String),

    #[error("pagination cursor rejected twice in one backfill run")]
    CursorPoisoned,

    #[error("store failure: {0}")]
    StoreFailure(#[from] sqlx::Error),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
}

impl IndexerError {
    pub fn code(&self) -> &'static str {
        match self {
            IndexerError::InvalidInput(_) => "INVALID_INPUT",
            IndexerError::UpstreamTransient(_) => "UPSTREAM_TRANSIENT",
            IndexerError::UpstreamPermanent(_) => "UPSTREAM_PERMANENT",
            IndexerError::CursorPoisoned => "CURSOR_POISONED",
            IndexerError::StoreFailure(_) => "STORE_FAILURE",
            IndexerError::PreconditionFailed(_) => "PRECONDITION_FAILED",
        }
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            IndexerError::InvalidInput(_) => Some("check the wallet address and configuration"),
            IndexerError::UpstreamTransient(_) => {
                Some("retry budget exhausted; the upstream may be degraded")
            }
            IndexerError::UpstreamPermanent(msg) if msg.contains("api-key") => {
                Some("check your API key")
            }
            IndexerError::CursorPoisoned => Some("cursor was reset once and rejected again"),
            IndexerError::StoreFailure(_) => Some("writes are idempotent; safe to retry"),
            IndexerError::PreconditionFailed(_) => Some("run backfill first"),
            _ => None,
        }
    }
}

impl From<ProviderError> for IndexerError {
    fn from(err: ProviderError) -> Self {
        match &err {
            ProviderError::CursorInvalid => {
                // Reaching here means the driver's one-shot self-heal was
                // already spent.
                IndexerError::CursorPoisoned
            }
            ProviderError::Unauthorized(msg) => {
                IndexerError::UpstreamPermanent(format!("api-key rejected: {msg}"))
            }
            ProviderError::Request { status, message } => {
                IndexerError::UpstreamPermanent(format!("status {status}: {message}"))
            }
            ProviderError::RateLimited | ProviderError::Server(_) | ProviderError::Network(_) => {
                IndexerError::UpstreamTransient(err.to_string())
            }
            ProviderError::Decode(msg) => {
                IndexerError::UpstreamPermanent(format!("undecodable response: {msg}"))
            }
        }
    }
}

impl From<ValidationError> for IndexerError {
    fn from(err: ValidationError) -> Self {
        IndexerError::InvalidInput(err.to_string())
    }
}

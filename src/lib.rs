pub mod config;
pub mod db;
pub mod error;
pub mod gate;
pub mod ingest;
pub mod metadata;
pub mod models;
pub mod oracle;
pub mod positions;
pub mod provider;
pub mod reconcile;
pub mod state;
pub mod validation;

#[cfg(test)]
pub mod tests;

pub use error::IndexerError;
pub use ingest::driver::{Indexer, StatusReport};
pub use models::{IngestStats, RawTransaction, SyncState, WalletEvent};
pub use positions::{PositionSummary, Reconstructor};
pub use reconcile::{ReconcileOutcome, Reconciler};
pub use state::AppState;
pub use validation::validate_wallet_address;

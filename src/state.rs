use sqlx::SqlitePool;
use std::sync::Arc;

use crate::config::Config;
use crate::ingest::Indexer;
use crate::metadata::TokenMetaResolver;
use crate::oracle::PriceOracle;
use crate::positions::Reconstructor;
use crate::provider::TransactionProvider;
use crate::reconcile::Reconciler;

/// Every collaborator the pipeline needs, injected at construction. The
/// pipeline components are built from this bundle.
pub struct AppState {
    pub config: Config,
    pub db_pool: SqlitePool,
    pub provider: Arc<dyn TransactionProvider>,
    pub oracle: Arc<dyn PriceOracle>,
    pub resolver: Arc<TokenMetaResolver>,
}

impl AppState {
    pub fn indexer(&self) -> Indexer {
        Indexer::new(
            self.provider.clone(),
            self.db_pool.clone(),
            self.resolver.clone(),
            self.config.page_limit,
            self.config.max_pages,
        )
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            self.provider.clone(),
            self.db_pool.clone(),
            self.resolver.clone(),
            self.config.page_limit,
            self.config.max_pages,
        )
    }

    pub fn reconstructor(&self) -> Reconstructor {
        Reconstructor::new(self.db_pool.clone(), self.oracle.clone())
    }
}

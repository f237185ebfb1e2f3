//! Offer catalog seam.
//!
//! The suggestion pipeline only ever reads the catalog through
//! [`OfferCatalog`], so tests can swap in an in-memory fake.

use async_trait::async_trait;

use wayfarer_core::types::{Offer, OfferQuery};
use wayfarer_storage::OfferRepository;

use crate::error::ChatError;

/// Read interface over the offer catalog.
#[async_trait]
pub trait OfferCatalog: Send + Sync {
    /// Offers matching `query`, ordered by its sort and capped at its limit.
    async fn search(&self, query: &OfferQuery) -> Result<Vec<Offer>, ChatError>;

    /// Location strings (destinations and countries) of the `limit` most
    /// recent active offers.
    async fn vocabulary(&self, limit: usize) -> Result<Vec<String>, ChatError>;
}

/// [`OfferCatalog`] backed by the SQLite repository.
#[derive(Clone)]
pub struct SqliteCatalog {
    repo: OfferRepository,
}

impl SqliteCatalog {
    pub fn new(repo: OfferRepository) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl OfferCatalog for SqliteCatalog {
    async fn search(&self, query: &OfferQuery) -> Result<Vec<Offer>, ChatError> {
        // rusqlite is blocking; keep it off the async workers.
        let repo = self.repo.clone();
        let query = query.clone();
        tokio::task::spawn_blocking(move || repo.search(&query))
            .await
            .map_err(|e| ChatError::Catalog(format!("Search task panicked: {}", e)))?
            .map_err(|e| ChatError::Catalog(e.to_string()))
    }

    async fn vocabulary(&self, limit: usize) -> Result<Vec<String>, ChatError> {
        let repo = self.repo.clone();
        tokio::task::spawn_blocking(move || repo.recent_vocabulary(limit))
            .await
            .map_err(|e| ChatError::Catalog(format!("Vocabulary task panicked: {}", e)))?
            .map_err(|e| ChatError::Catalog(e.to_string()))
    }
}

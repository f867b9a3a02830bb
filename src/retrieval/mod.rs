
use tracing::{debug, info};

use crate::config::{SearchConfig, SearchMode};
use crate::embeddings::EmbeddingProvider;
use crate::store::{DocumentStore, ScoredDocument};
use crate::{RagError, Result};

/// Highest number of results a single search may request
pub const MAX_SEARCH_LIMIT: usize = 100;

/// Similarity search over the document store.
///
/// Owns the store and the embedding provider; the execution strategy is
/// fixed at construction from the search configuration.
pub struct RetrievalService {
    store: DocumentStore,
    provider: Box<dyn EmbeddingProvider>,
    mode: SearchMode,
    candidate_pool: usize,
}

impl RetrievalService {
    #[inline]
    pub fn new(
        store: DocumentStore,
        provider: Box<dyn EmbeddingProvider>,
        search: &SearchConfig,
    ) -> Self {
        Self {
            store,
            provider,
            mode: search.mode,
            candidate_pool: search.candidate_pool as usize,
        }
    }

    /// Embed the query and return documents scoring at or above the
    /// threshold, best first
    #[inline]
    pub async fn retrieve(
        &self,
        query: &str,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<ScoredDocument>> {
        validate_search_params(query, limit, threshold)?;

        let query_vector = self
            .provider
            .embed_query(query)
            .map_err(|e| RagError::Retrieval(format!("failed to embed query: {e}")))?;

        debug!(
            "Retrieving up to {} documents (threshold {}, mode {:?})",
            limit, threshold, self.mode
        );

        let results = match self.mode {
            SearchMode::Scan => {
                self.store
                    .scan_and_score(&query_vector, None, limit, threshold)
                    .await?
            }
            SearchMode::Native => {
                self.store
                    .native_vector_search(&query_vector, limit, threshold, self.candidate_pool)
                    .await?
            }
        };

        info!("Retrieved {} documents for query", results.len());
        Ok(results)
    }

    /// The store this service searches
    #[inline]
    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// The provider embedding the queries
    #[inline]
    pub fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }
}

fn validate_search_params(query: &str, limit: usize, threshold: f32) -> Result<()> {
    if query.trim().is_empty() {
        return Err(RagError::Validation("query cannot be empty".to_string()));
    }
    if !(1..=MAX_SEARCH_LIMIT).contains(&limit) {
        return Err(RagError::Validation(format!(
            "limit must be between 1 and {MAX_SEARCH_LIMIT}, got {limit}"
        )));
    }
    if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
        return Err(RagError::Validation(format!(
            "threshold must be between 0.0 and 1.0, got {threshold}"
        )));
    }
    Ok(())
}

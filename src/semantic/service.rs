//! Semantic product search service.
//!
//! Owns the embedding provider and the current similarity index:
//! - `build_index` fetches the catalog, encodes it in one batch and publishes
//!   a fresh immutable index in a single swap
//! - `search` encodes the query, ranks, filters, and falls back
//! - Before the first successful build, searches return no results

use std::sync::{Arc, RwLock};
use std::time::Instant;

use crate::products::{DataSourceError, ProductRecord, ProductSource};
use crate::semantic::embeddings::{Embedder, EmbeddingError};
use crate::semantic::index::{normalize, IndexError, SimilarityIndex};
use crate::semantic::lexical::query_tokens;
use crate::semantic::ranking::{rank_and_filter, SearchResult, DEFAULT_CANDIDATE_POOL};

/// Errors that can occur during index build or search.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Data source error: {0}")]
    DataSource(#[from] DataSourceError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Service for semantic product search.
///
/// The index is absent until [`SearchService::build_index`] succeeds. Readers
/// take a cheap `Arc` snapshot, so a rebuild never exposes a half-built index
/// to in-flight queries.
pub struct SearchService {
    embedder: Arc<dyn Embedder>,
    candidate_pool: usize,
    index: RwLock<Option<Arc<SimilarityIndex>>>,
}

impl SearchService {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self::with_candidate_pool(embedder, DEFAULT_CANDIDATE_POOL)
    }

    pub fn with_candidate_pool(embedder: Arc<dyn Embedder>, candidate_pool: usize) -> Self {
        Self {
            embedder,
            candidate_pool: candidate_pool.max(1),
            index: RwLock::new(None),
        }
    }

    /// Name of the embedding model in use.
    pub fn model_name(&self) -> &str {
        self.embedder.name()
    }

    /// Fetch the full catalog from `source` and index it.
    ///
    /// On failure the previously published index (if any) stays in place.
    /// Returns the number of indexed products.
    pub async fn build_index<S: ProductSource>(&self, source: &S) -> Result<usize, SearchError> {
        log::info!("Loading products from source");
        let records = source.fetch_all().await?;
        log::info!("Loaded {} products", records.len());

        self.index_records(records)
    }

    /// Encode `records` and publish them as the new index.
    pub fn index_records(&self, records: Vec<ProductRecord>) -> Result<usize, SearchError> {
        let started = Instant::now();

        log::info!("Encoding {} products with '{}'", records.len(), self.model_name());
        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let embeddings = self.embedder.encode(&texts)?;

        let index = SimilarityIndex::from_embeddings(records, embeddings)?;
        let count = index.len();

        log::info!(
            "Similarity index ready: {} products, {} dimensions, {:?}",
            count,
            index.dimensions(),
            started.elapsed()
        );

        self.publish(index)?;

        Ok(count)
    }

    fn publish(&self, index: SimilarityIndex) -> Result<(), SearchError> {
        let mut guard = self
            .index
            .write()
            .map_err(|e| SearchError::Internal(format!("Lock poisoned: {}", e)))?;
        *guard = Some(Arc::new(index));
        Ok(())
    }

    /// Current index generation, if one has been built.
    ///
    /// The read lock is held only long enough to clone the `Arc`; it exists so
    /// `build_index` can swap in a new generation while queries are running.
    pub fn snapshot(&self) -> Option<Arc<SimilarityIndex>> {
        self.index.read().ok().and_then(|guard| guard.clone())
    }

    /// Check if an index has been published.
    pub fn is_ready(&self) -> bool {
        self.snapshot().is_some()
    }

    /// Get the number of indexed products.
    ///
    /// Returns 0 if no index has been built.
    pub fn indexed_count(&self) -> usize {
        self.snapshot().map(|index| index.len()).unwrap_or(0)
    }

    /// Search the catalog.
    ///
    /// Returns at most `top_k` results ordered by the ranking/filter/fallback
    /// rules, or an empty list if the index has not been built yet.
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>, SearchError> {
        let Some(index) = self.snapshot() else {
            log::debug!("search before index is ready: {query:?}");
            return Ok(vec![]);
        };

        let tokens = query_tokens(query);
        let query_vec = normalize(&self.embedder.encode_one(query)?);

        let results = rank_and_filter(&index, &query_vec, &tokens, top_k, self.candidate_pool)?;

        log::debug!(
            "query {:?} tokens {:?}: {} results",
            query,
            tokens,
            results.len()
        );

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::products::StaticProductSource;
    use crate::tests::{catalog, HashEmbedder};

    fn service() -> SearchService {
        SearchService::new(Arc::new(HashEmbedder::default()))
    }

    struct FailingEmbedder;

    impl Embedder for FailingEmbedder {
        fn encode(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::EmbeddingFailed("model unavailable".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn test_not_ready_initially() {
        let service = service();
        assert!(!service.is_ready());
        assert_eq!(service.indexed_count(), 0);
        assert!(service.snapshot().is_none());
    }

    #[test]
    fn test_search_before_build_is_empty() {
        let service = service();
        assert!(service.search("steel", 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_build_index_from_source() {
        let service = service();
        let source = StaticProductSource::new(catalog(&[
            (1, "Steel Pipe Clamp"),
            (2, "Rubber Gasket Seal"),
        ]));

        let count = service.build_index(&source).await.unwrap();

        assert_eq!(count, 2);
        assert!(service.is_ready());
        assert_eq!(service.indexed_count(), 2);
    }

    #[test]
    fn test_failed_build_leaves_service_not_ready() {
        let service = SearchService::new(Arc::new(FailingEmbedder));

        let result = service.index_records(catalog(&[(1, "Steel Pipe Clamp")]));

        assert!(matches!(result, Err(SearchError::Embedding(_))));
        assert!(!service.is_ready());
        assert!(service.search("steel", 10).unwrap().is_empty());
    }

    #[test]
    fn test_rebuild_replaces_index() {
        let service = service();
        service
            .index_records(catalog(&[(1, "Steel Pipe Clamp")]))
            .unwrap();
        let first = service.snapshot().unwrap();

        service
            .index_records(catalog(&[(2, "Rubber Gasket Seal"), (3, "Steel Beam Support")]))
            .unwrap();

        // the old snapshot is untouched
        assert_eq!(first.len(), 1);
        assert_eq!(service.indexed_count(), 2);
    }

    #[test]
    fn test_search_returns_raw_scores_in_order() {
        let service = service();
        service
            .index_records(catalog(&[
                (1, "Steel Pipe Clamp"),
                (2, "Rubber Gasket Seal"),
                (3, "Steel Beam Support"),
            ]))
            .unwrap();

        let results = service.search("a b", 3).unwrap();

        assert_eq!(results.len(), 3);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(results.iter().all(|r| (-1.0 - 1e-5..=1.0 + 1e-5).contains(&r.score)));
    }

    #[test]
    fn test_query_embedding_failure_is_an_error() {
        let service = SearchService::new(Arc::new(FailingEmbedder));
        service
            .publish(SimilarityIndex::from_embeddings(
                catalog(&[(1, "Steel Pipe Clamp")]),
                vec![vec![1.0, 0.0]],
            ).unwrap())
            .unwrap();

        assert!(matches!(
            service.search("steel", 10),
            Err(SearchError::Embedding(_))
        ));
    }
}

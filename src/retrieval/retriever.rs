//! Hybrid retriever: strategy dispatch, fusion, thresholding, reranking.
//!
//! The entry point of the read path. A query is classified (unless the
//! caller pinned a strategy), fanned out over the store, optionally fused,
//! threshold-filtered, optionally reranked, and trimmed. Partial failures
//! degrade results; only tenant violations and total retrieval failure
//! surface as errors.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::Config;
use crate::constants::{SPARSE_FIELD, TEXT_DENSE_FIELD};
use crate::embedding::EmbedderRegistry;
use crate::rerankers::RerankerRouter;
use crate::store::{SparseVector, StoreFilter, VectorStore};

use super::classifier::QueryClassifier;
use super::error::RetrievalError;
use super::fusion::rrf_fuse;
use super::types::{
    RerankerTier, SearchFilters, SearchQuery, SearchResultItem, SearchStrategy,
};

/// Retriever tuning, derived from the service configuration.
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Collection the retriever searches.
    pub collection: String,
    /// Strategy used when the classifier is bypassed.
    pub default_strategy: SearchStrategy,
    /// Let the classifier pick strategy for queries that do not pin one.
    pub use_classifier: bool,
    /// Score floor for dense retrieval.
    pub min_score_dense: f32,
    /// Score floor for sparse retrieval.
    pub min_score_sparse: f32,
    /// Score floor for hybrid retrieval.
    pub min_score_hybrid: f32,
    /// RRF fusion constant.
    pub rrf_k: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            collection: "recall_memory".to_string(),
            default_strategy: SearchStrategy::Hybrid,
            use_classifier: true,
            min_score_dense: crate::constants::MIN_SCORE_DENSE,
            min_score_sparse: crate::constants::MIN_SCORE_SPARSE,
            min_score_hybrid: crate::constants::MIN_SCORE_HYBRID,
            rrf_k: crate::constants::RRF_K,
        }
    }
}

impl RetrieverConfig {
    /// Builds retriever tuning from the service configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            collection: config.collection.clone(),
            default_strategy: config.default_strategy,
            use_classifier: true,
            min_score_dense: config.min_score_dense,
            min_score_sparse: config.min_score_sparse,
            min_score_hybrid: config.min_score_hybrid,
            rrf_k: config.rrf_k,
        }
    }
}

/// Strategy-dispatching retriever over one collection.
pub struct HybridRetriever {
    store: Arc<dyn VectorStore>,
    embedders: Arc<EmbedderRegistry>,
    router: Arc<RerankerRouter>,
    classifier: QueryClassifier,
    config: RetrieverConfig,
}

impl HybridRetriever {
    /// Creates a retriever over shared collaborators.
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedders: Arc<EmbedderRegistry>,
        router: Arc<RerankerRouter>,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            store,
            embedders,
            router,
            classifier: QueryClassifier::new(),
            config,
        }
    }

    /// Executes a search end to end: dispatch, fuse, filter, rerank, trim.
    ///
    /// Returns at most `query.limit` results, best first. Refuses queries
    /// without a tenant id before touching any collaborator.
    pub async fn search(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<SearchResultItem>, RetrievalError> {
        let filters = query
            .filters
            .as_ref()
            .filter(|f| !f.org_id.is_empty())
            .ok_or(RetrievalError::TenantMissing)?;

        let strategy = self.resolve_strategy(query);
        let fetch_limit = if query.rerank {
            query.rerank_depth.max(query.limit)
        } else {
            query.limit
        };

        let store_filter = to_store_filter(filters);

        debug!(
            %strategy,
            limit = query.limit,
            fetch_limit,
            org_id = %filters.org_id,
            "Dispatching search"
        );

        let mut results = match strategy {
            SearchStrategy::Dense => self
                .dense_leg(&query.text, &store_filter, fetch_limit)
                .await
                .map_err(|reason| RetrievalError::RetrievalFailed { reason })?,
            SearchStrategy::Sparse => self
                .sparse_leg(&query.text, &store_filter, fetch_limit)
                .await
                .map_err(|reason| RetrievalError::RetrievalFailed { reason })?,
            SearchStrategy::Hybrid => {
                let (dense, sparse) = tokio::join!(
                    self.dense_leg(&query.text, &store_filter, fetch_limit),
                    self.sparse_leg(&query.text, &store_filter, fetch_limit),
                );

                match (dense, sparse) {
                    (Ok(dense), Ok(sparse)) => rrf_fuse(vec![dense, sparse], self.config.rrf_k),
                    (Ok(mut dense), Err(reason)) => {
                        warn!(%reason, "sparse leg failed, degrading to dense results");
                        for item in &mut dense {
                            item.mark_degraded("sparse_failed");
                        }
                        dense
                    }
                    (Err(reason), Ok(mut sparse)) => {
                        warn!(%reason, "dense leg failed, degrading to sparse results");
                        for item in &mut sparse {
                            item.mark_degraded("dense_failed");
                        }
                        sparse
                    }
                    (Err(dense_reason), Err(sparse_reason)) => {
                        return Err(RetrievalError::RetrievalFailed {
                            reason: format!(
                                "both retrieval legs failed: {dense_reason}; {sparse_reason}"
                            ),
                        });
                    }
                }
            }
        };

        // Threshold filter on the base score (the store's similarity), with
        // the per-strategy floor. Fusion scores live on a different scale and
        // are an ordering signal, not a similarity.
        let threshold = self.effective_threshold(query.threshold, strategy);
        results.retain(|item| item.reranker_score.unwrap_or(item.score) >= threshold);

        if query.rerank {
            results = self
                .apply_rerank(&query.text, results, query.rerank_tier, query.rerank_depth)
                .await;
        }

        results.truncate(query.limit);
        Ok(results)
    }

    /// Reranks the top `depth` results through the router, copying tier and
    /// score onto survivors; on a degraded outcome the pre-rerank ordering
    /// is kept and every result is marked.
    pub(crate) async fn apply_rerank(
        &self,
        query_text: &str,
        results: Vec<SearchResultItem>,
        tier_override: Option<RerankerTier>,
        depth: usize,
    ) -> Vec<SearchResultItem> {
        rerank_results(&self.router, query_text, results, tier_override, depth).await
    }

    fn resolve_strategy(&self, query: &SearchQuery) -> SearchStrategy {
        if let Some(strategy) = query.strategy {
            return strategy;
        }

        if self.config.use_classifier {
            self.classifier.strategy(&query.text).0
        } else {
            self.config.default_strategy
        }
    }

    fn effective_threshold(&self, requested: f32, strategy: SearchStrategy) -> f32 {
        let floor = match strategy {
            SearchStrategy::Dense => self.config.min_score_dense,
            SearchStrategy::Sparse => self.config.min_score_sparse,
            SearchStrategy::Hybrid => self.config.min_score_hybrid,
        };

        requested.max(floor)
    }

    async fn dense_leg(
        &self,
        text: &str,
        filter: &StoreFilter,
        limit: usize,
    ) -> Result<Vec<SearchResultItem>, String> {
        let embedder = self
            .embedders
            .text()
            .await
            .map_err(|e| format!("text embedder unavailable: {e}"))?;

        let vector = embedder
            .embed(text, true)
            .await
            .map_err(|e| format!("dense embedding failed: {e}"))?;

        let hits = self
            .store
            .query_dense(&self.config.collection, TEXT_DENSE_FIELD, vector, filter, limit)
            .await
            .map_err(|e| format!("dense query failed: {e}"))?;

        Ok(hits.into_iter().map(SearchResultItem::from_hit).collect())
    }

    async fn sparse_leg(
        &self,
        text: &str,
        filter: &StoreFilter,
        limit: usize,
    ) -> Result<Vec<SearchResultItem>, String> {
        let embedder = self.embedders.sparse().await;
        let sparse = SparseVector::from_map(&embedder.embed_sparse(text));

        if sparse.is_empty() {
            return Ok(vec![]);
        }

        let hits = self
            .store
            .query_sparse(&self.config.collection, SPARSE_FIELD, sparse, filter, limit)
            .await
            .map_err(|e| format!("sparse query failed: {e}"))?;

        Ok(hits.into_iter().map(SearchResultItem::from_hit).collect())
    }
}

/// Shared rerank application used by the hybrid and multi-query retrievers.
pub(crate) async fn rerank_results(
    router: &RerankerRouter,
    query_text: &str,
    mut results: Vec<SearchResultItem>,
    tier_override: Option<RerankerTier>,
    depth: usize,
) -> Vec<SearchResultItem> {
    if results.is_empty() {
        return results;
    }

    let window = depth.min(results.len());
    let texts: Vec<String> = results[..window]
        .iter()
        .map(|item| item.content().unwrap_or_default().to_string())
        .collect();

    let outcome = router.rerank(query_text, &texts, tier_override, None).await;

    if outcome.degraded {
        let reason = outcome
            .degraded_reason
            .unwrap_or_else(|| "rerank_failed".to_string());
        for item in &mut results {
            item.mark_degraded(&reason);
        }
        return results;
    }

    let tail = results.split_off(window);
    let mut reordered = Vec::with_capacity(results.len() + tail.len());

    // The router hands back indexes into the window; apply its order and
    // copy scores onto the survivors.
    let mut window_items: Vec<Option<SearchResultItem>> = results.into_iter().map(Some).collect();
    for ranked in outcome.results {
        if let Some(mut item) = window_items.get_mut(ranked.original_index).and_then(Option::take) {
            item.reranker_score = Some(ranked.score);
            item.rerank_tier = Some(outcome.tier);
            reordered.push(item);
        }
    }

    // Anything the tier dropped (top_k inside the router) keeps its place
    // after the reranked head.
    for item in window_items.into_iter().flatten() {
        reordered.push(item);
    }

    reordered.extend(tail);
    reordered
}

fn to_store_filter(filters: &SearchFilters) -> StoreFilter {
    StoreFilter {
        org_id: filters.org_id.clone(),
        session_id: filters.session_id.clone(),
        type_tag: filters.type_tag.clone(),
        time_range: filters.time_range.map(|r| (r.start, r.end)),
        vt_end_after: filters.vt_end_after,
    }
}

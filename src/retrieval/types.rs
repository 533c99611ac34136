//! Core request/response types of the retrieval pipeline.

use serde::{Deserialize, Serialize};

use crate::store::PointId;

/// How a query fans out over the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStrategy {
    /// Dense vector search over semantic embeddings.
    Dense,
    /// Sparse vector search over lexical weights.
    Sparse,
    /// Both, merged with Reciprocal Rank Fusion.
    Hybrid,
}

impl std::fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchStrategy::Dense => write!(f, "dense"),
            SearchStrategy::Sparse => write!(f, "sparse"),
            SearchStrategy::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// Reranking quality/latency tradeoff points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RerankerTier {
    /// Lexical scorer, ~10ms.
    Fast,
    /// Cross-encoder, ~50ms.
    Accurate,
    /// Code-specialised cross-encoder, ~50ms.
    Code,
    /// Late-interaction MaxSim, ~30ms.
    Colbert,
    /// Listwise LLM reranking, ~500ms, rate-limited, explicit opt-in only.
    Llm,
}

impl std::fmt::Display for RerankerTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RerankerTier::Fast => write!(f, "fast"),
            RerankerTier::Accurate => write!(f, "accurate"),
            RerankerTier::Code => write!(f, "code"),
            RerankerTier::Colbert => write!(f, "colbert"),
            RerankerTier::Llm => write!(f, "llm"),
        }
    }
}

/// Complexity class driving tier selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryComplexity {
    /// Short keyword queries.
    Simple,
    /// Multi-clause or moderately involved queries.
    Moderate,
    /// Long, operator-heavy, or code-bearing queries.
    Complex,
}

/// Inclusive time window over the `timestamp` payload field, epoch
/// milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Window start.
    pub start: i64,
    /// Window end.
    pub end: i64,
}

/// Payload filters narrowing a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Tenant isolation key. Required before any store call is issued.
    pub org_id: String,
    /// Session scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Memory type tag (thought, code, doc).
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_tag: Option<String>,
    /// Time window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
    /// Keep memories whose `vt_end` is strictly after this timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vt_end_after: Option<i64>,
}

impl SearchFilters {
    /// Creates a tenant-only filter.
    pub fn for_org(org_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            session_id: None,
            type_tag: None,
            time_range: None,
            vt_end_after: None,
        }
    }
}

fn default_limit() -> usize {
    10
}

fn default_threshold() -> f32 {
    0.5
}

fn default_rerank() -> bool {
    true
}

fn default_rerank_depth() -> usize {
    crate::constants::DEFAULT_RERANK_DEPTH
}

/// Immutable search request descriptor.
///
/// The HTTP surface validates ranges (`limit` in `[1, 100]`, `threshold` in
/// `[0, 1]`, non-empty text) before the query enters the pipeline; the
/// pipeline itself enforces tenant isolation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Query text.
    pub text: String,
    /// Maximum results to return.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Minimum effective score.
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    /// Payload filters; `org_id` is mandatory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<SearchFilters>,
    /// Search strategy; classifier-selected when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<SearchStrategy>,
    /// Apply reranking.
    #[serde(default = "default_rerank")]
    pub rerank: bool,
    /// Reranker tier; router-selected when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_tier: Option<RerankerTier>,
    /// Candidates reranked before trimming to `limit`.
    #[serde(default = "default_rerank_depth")]
    pub rerank_depth: usize,
}

impl SearchQuery {
    /// Builds a query with defaults for everything but the text.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            limit: default_limit(),
            threshold: default_threshold(),
            filters: None,
            strategy: None,
            rerank: default_rerank(),
            rerank_tier: None,
            rerank_depth: default_rerank_depth(),
        }
    }

    /// Sets the tenant filter.
    pub fn for_org(mut self, org_id: impl Into<String>) -> Self {
        self.filters = Some(match self.filters.take() {
            Some(mut filters) => {
                filters.org_id = org_id.into();
                filters
            }
            None => SearchFilters::for_org(org_id),
        });
        self
    }
}

/// One scored retrieval result.
///
/// `rrf_score` is present exactly on results that passed through fusion and
/// `reranker_score` exactly on results that survived reranking. `degraded`
/// marks results produced while some pipeline stage was running on a
/// fallback path; once set it is never cleared downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResultItem {
    /// Store-assigned id.
    pub id: PointId,
    /// Base similarity score from the store.
    pub score: f32,
    /// Fusion score, hybrid/multi-query paths only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rrf_score: Option<f32>,
    /// Reranker score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reranker_score: Option<f32>,
    /// Tier that actually reranked this result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_tier: Option<RerankerTier>,
    /// Payload (content plus metadata).
    pub payload: serde_json::Map<String, serde_json::Value>,
    /// Produced by a fallback path.
    #[serde(default)]
    pub degraded: bool,
    /// Why the fallback engaged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded_reason: Option<String>,
}

impl SearchResultItem {
    /// Builds a plain result from a store hit.
    pub fn from_hit(hit: crate::store::StoreHit) -> Self {
        Self {
            id: hit.id,
            score: hit.score,
            rrf_score: None,
            reranker_score: None,
            rerank_tier: None,
            payload: hit.payload,
            degraded: false,
            degraded_reason: None,
        }
    }

    /// Effective score for thresholding and ordering: reranker when present,
    /// else fusion, else the base score.
    pub fn effective_score(&self) -> f32 {
        self.reranker_score
            .or(self.rrf_score)
            .unwrap_or(self.score)
    }

    /// Marks the result degraded, augmenting any existing reason.
    pub fn mark_degraded(&mut self, reason: &str) {
        self.degraded = true;
        self.degraded_reason = Some(match self.degraded_reason.take() {
            Some(existing) if !existing.contains(reason) => format!("{existing}; {reason}"),
            Some(existing) => existing,
            None => reason.to_string(),
        });
    }

    /// Content string from the payload, when present.
    pub fn content(&self) -> Option<&str> {
        self.payload.get("content").and_then(|v| v.as_str())
    }
}

/// Search response returned to the HTTP surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Ranked results, best first.
    pub results: Vec<SearchResultItem>,
    /// Number of results.
    pub total: usize,
    /// Wall time spent serving the query, in milliseconds.
    pub took_ms: u64,
}

//! The retrieval pipeline.
//!
//! A query flows through: classification ([`classifier`]) -> strategy
//! fan-out and RRF fusion ([`retriever`], [`fusion`]) -> optional reranking
//! (via [`crate::rerankers`]) -> trimming. [`session`] adds the two-stage
//! session/turn variant and [`multi_query`] the LLM-expanded variant.

/// Query classification.
pub mod classifier;
mod error;
/// Reciprocal Rank Fusion.
pub mod fusion;
/// LLM query expansion.
pub mod multi_query;
/// Hybrid retriever.
pub mod retriever;
/// Session-aware two-stage retriever.
pub mod session;
/// Request/response types.
pub mod types;


pub use classifier::{Classification, QueryClassifier, QueryFeatures};
pub use error::RetrievalError;
pub use fusion::rrf_fuse;
pub use multi_query::{ExpansionUsage, MultiQueryConfig, MultiQueryRetriever};
pub use retriever::{HybridRetriever, RetrieverConfig};
pub use session::{SessionAwareRetriever, SessionRetrieverConfig, SessionSearchResult};
pub use types::{
    QueryComplexity, RerankerTier, SearchFilters, SearchQuery, SearchResponse, SearchResultItem,
    SearchStrategy, TimeRange,
};

//! Result reranking tiers and the router that picks between them.
//!
//! Every tier implements [`Reranker`]: query + candidate texts in, ranked
//! `(text, score, original_index)` out, sorted by score descending. The
//! [`RerankerRouter`] selects a tier from query features, bounds each call
//! with a timeout, and falls back to the original ordering (with degraded
//! markers) on any failure.

/// Late-interaction MaxSim tier.
pub mod colbert;
/// Cross-encoder tiers (accurate / code).
pub mod cross_encoder;
mod error;
/// Lexical fast tier.
pub mod lexical;
/// Listwise LLM tier.
pub mod llm;
/// Tier selection, timeouts, fallback.
pub mod router;

#[cfg(test)]
mod tests;

pub use colbert::ColbertReranker;
pub use cross_encoder::{CrossEncoderConfig, CrossEncoderReranker};
pub use error::RerankError;
pub use lexical::LexicalReranker;
pub use llm::LlmReranker;
pub use router::{RerankOutcome, RerankerRouter, RouterConfig, TierSet};

use async_trait::async_trait;

/// One reranked candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedResult {
    /// Candidate text.
    pub text: String,
    /// Reranker score; higher is better.
    pub score: f32,
    /// Index of this candidate in the input list.
    pub original_index: usize,
}

/// A reranking tier.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Reorders `documents` by relevance to `query`, keeping the top
    /// `top_k` when given.
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_k: Option<usize>,
    ) -> Result<Vec<RankedResult>, RerankError>;
}

/// Sorts ranked results by score descending, stable on the original index,
/// and applies `top_k`.
pub(crate) fn finalize_ranking(
    mut results: Vec<RankedResult>,
    top_k: Option<usize>,
) -> Vec<RankedResult> {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.original_index.cmp(&b.original_index))
    });

    if let Some(top_k) = top_k {
        results.truncate(top_k);
    }

    results
}

//! Colbert tier: late-interaction MaxSim reranking.
//!
//! Scores a candidate as the mean over query tokens of the maximum dot
//! product against the candidate's token vectors. Token vectors come from
//! the shared [`ColbertEmbedder`], so the tier works in both model-backed
//! and stub mode.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::embedding::ColbertEmbedder;

use super::error::RerankError;
use super::{RankedResult, Reranker, finalize_ranking};

/// MaxSim reranker over the shared ColBERT embedder.
pub struct ColbertReranker {
    embedder: Arc<ColbertEmbedder>,
}

impl ColbertReranker {
    /// Creates the tier over an embedder instance.
    pub fn new(embedder: Arc<ColbertEmbedder>) -> Self {
        Self { embedder }
    }
}

/// Mean-over-query-tokens of max dot product against document tokens.
pub fn maxsim(query_tokens: &[Vec<f32>], document_tokens: &[Vec<f32>]) -> f32 {
    if query_tokens.is_empty() || document_tokens.is_empty() {
        return 0.0;
    }

    let total: f32 = query_tokens
        .iter()
        .map(|q| {
            document_tokens
                .iter()
                .map(|d| q.iter().zip(d).map(|(a, b)| a * b).sum::<f32>())
                .fold(f32::NEG_INFINITY, f32::max)
        })
        .sum();

    total / query_tokens.len() as f32
}

#[async_trait]
impl Reranker for ColbertReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_k: Option<usize>,
    ) -> Result<Vec<RankedResult>, RerankError> {
        if documents.is_empty() {
            return Ok(vec![]);
        }

        let query_tokens = self.embedder.embed_query(query).await?;
        let document_tokens = self.embedder.embed_document_batch(documents).await?;

        debug!(
            num_candidates = documents.len(),
            query_tokens = query_tokens.len(),
            "ColBERT MaxSim reranking"
        );

        let results = documents
            .iter()
            .zip(&document_tokens)
            .enumerate()
            .map(|(original_index, (text, tokens))| RankedResult {
                text: text.clone(),
                score: maxsim(&query_tokens, tokens),
                original_index,
            })
            .collect();

        Ok(finalize_ranking(results, top_k))
    }
}

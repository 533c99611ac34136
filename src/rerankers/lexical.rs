//! Fast tier: lexical overlap scoring.
//!
//! Blends content-word recall with Jaccard similarity and squashes the
//! result through a sigmoid so scores land in (0, 1) like the model-backed
//! tiers. No model files, single-digit-millisecond latency.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;

use super::error::RerankError;
use super::{RankedResult, Reranker, finalize_ranking};

static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
        "do", "does", "did", "will", "would", "could", "should", "may", "might", "must", "shall",
        "can", "need", "ought", "used", "to", "of", "in", "for", "on", "with", "at", "by", "from",
        "as", "into", "through", "during", "before", "after", "above", "below", "between", "under",
        "again", "further", "then", "once", "here", "there", "when", "where", "why", "how", "all",
        "each", "few", "more", "most", "other", "some", "such", "no", "nor", "not", "only", "own",
        "same", "so", "than", "too", "very", "just", "and", "but", "if", "or", "because", "until",
        "while", "what", "which", "who", "whom", "this", "that", "these", "those", "am", "it",
        "its",
    ]
    .into_iter()
    .collect()
});

fn content_words(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty() && !STOP_WORDS.contains(w))
        .map(|w| w.to_string())
        .collect()
}

/// Lexical overlap reranker (fast tier).
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalReranker;

impl LexicalReranker {
    /// Creates the reranker.
    pub fn new() -> Self {
        Self
    }

    /// Scores one query/candidate pair in (0, 1).
    pub fn score(&self, query: &str, candidate: &str) -> f32 {
        let query_words = content_words(query);
        let candidate_words = content_words(candidate);

        if query_words.is_empty() {
            let len_ratio = (query.len().min(candidate.len()) as f32)
                / (query.len().max(candidate.len()).max(1) as f32);
            return len_ratio * 0.3;
        }

        let matches = query_words.intersection(&candidate_words).count();
        let recall = matches as f32 / query_words.len() as f32;

        let union = query_words.union(&candidate_words).count();
        let jaccard = if union > 0 {
            matches as f32 / union as f32
        } else {
            0.0
        };

        let base = 0.6 * recall + 0.4 * jaccard;
        let normalized = 1.0 / (1.0 + (-8.0 * (base - 0.5)).exp());

        normalized.clamp(0.0, 1.0)
    }
}

#[async_trait]
impl Reranker for LexicalReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_k: Option<usize>,
    ) -> Result<Vec<RankedResult>, RerankError> {
        let results = documents
            .iter()
            .enumerate()
            .map(|(original_index, text)| RankedResult {
                text: text.clone(),
                score: self.score(query, text),
                original_index,
            })
            .collect();

        Ok(finalize_ranking(results, top_k))
    }
}

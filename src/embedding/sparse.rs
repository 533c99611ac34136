//! Lexical sparse embedder.
//!
//! BM25-style term weighting over hashed tokens: each surviving token maps
//! to a stable vocabulary index (blake3 of the token, folded to `u32`) with
//! a saturated term-frequency weight. The output is a sparse index -> weight
//! map compatible with the store's sparse vector search.
//!
//! Fully algorithmic; `load`/`unload` are no-ops kept for the uniform
//! embedder lifecycle.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::LazyLock;

use super::error::EmbeddingError;

/// Construction parameters for the sparse embedder.
#[derive(Debug, Clone)]
pub struct SparseConfig {
    /// Term-frequency saturation constant.
    pub k1: f32,
    /// Length-normalisation strength.
    pub b: f32,
    /// Expected document length in tokens, for normalisation.
    pub avg_doc_len: f32,
}

impl Default for SparseConfig {
    fn default() -> Self {
        Self {
            k1: 1.2,
            b: 0.75,
            avg_doc_len: 256.0,
        }
    }
}

static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
        "do", "does", "did", "will", "would", "could", "should", "may", "might", "must", "shall",
        "can", "to", "of", "in", "for", "on", "with", "at", "by", "from", "as", "into", "through",
        "during", "before", "after", "above", "below", "between", "under", "again", "then", "once",
        "here", "there", "when", "where", "why", "how", "all", "each", "few", "more", "most",
        "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than", "too",
        "very", "just", "and", "but", "if", "or", "because", "until", "while", "what", "which",
        "who", "whom", "this", "that", "these", "those", "am", "it", "its",
    ]
    .into_iter()
    .collect()
});

/// Sparse lexical embedder.
#[derive(Debug, Clone, Default)]
pub struct SparseEmbedder {
    config: SparseConfig,
}

impl SparseEmbedder {
    /// Creates the embedder.
    pub fn new(config: SparseConfig) -> Self {
        Self { config }
    }

    /// No-op, kept for the uniform embedder lifecycle.
    pub async fn load(&self) -> Result<(), EmbeddingError> {
        Ok(())
    }

    /// No-op, kept for the uniform embedder lifecycle.
    pub async fn unload(&self) {}

    /// Sparse embedding of one text: index -> positive weight.
    pub fn embed_sparse(&self, text: &str) -> HashMap<u32, f32> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return HashMap::new();
        }

        let doc_len = tokens.len() as f32;

        let mut term_freq: HashMap<u32, f32> = HashMap::new();
        for token in &tokens {
            *term_freq.entry(term_index(token)).or_insert(0.0) += 1.0;
        }

        let k1 = self.config.k1;
        let norm = 1.0 - self.config.b + self.config.b * doc_len / self.config.avg_doc_len;

        term_freq
            .into_iter()
            .map(|(index, tf)| (index, tf * (k1 + 1.0) / (tf + k1 * norm)))
            .collect()
    }

    /// Batch sparse embedding, preserving order.
    pub fn embed_sparse_batch(&self, texts: &[String]) -> Vec<HashMap<u32, f32>> {
        texts.iter().map(|t| self.embed_sparse(t)).collect()
    }
}

/// Stable vocabulary index for a token.
fn term_index(token: &str) -> u32 {
    let hash = blake3::hash(token.as_bytes());
    u32::from_le_bytes(hash.as_bytes()[..4].try_into().unwrap_or_default())
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1 && !STOP_WORDS.contains(t))
        .map(|t| t.to_string())
        .collect()
}

use thiserror::Error;

use crate::embedding::EmbeddingError;
use crate::llm::LlmError;

#[derive(Debug, Error)]
/// Errors returned by individual reranking tiers.
///
/// The router never propagates these to retrieval callers; they surface as
/// degraded markers on the fallback ordering.
pub enum RerankError {
    /// Model inference failed.
    #[error("rerank inference failed: {reason}")]
    Inference {
        /// Error message.
        reason: String,
    },

    /// The tier produced output the router could not apply.
    #[error("rerank response invalid: {reason}")]
    InvalidResponse {
        /// Error message.
        reason: String,
    },

    /// Embedding backend failure (colbert tier).
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    /// Provider failure (llm tier).
    #[error(transparent)]
    Llm(#[from] LlmError),
}

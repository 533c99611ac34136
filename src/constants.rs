//! Cross-cutting, shared constants.
//!
//! Prefer deriving secondary constants from primary ones to avoid drift. The
//! per-strategy score floors and the RRF constant are the tuning surface of
//! the retrieval pipeline; everything else is wiring.

/// RRF fusion constant.
///
/// The fused score of a document at rank `r` in one input list is
/// `1 / (RRF_K + r)`, summed across lists. A higher value flattens rank
/// differences, making the fusion more conservative. 60 is the usual choice
/// and balances dense and sparse contributions for two-way fusion.
pub const RRF_K: usize = 60;

/// Minimum score floor for dense-only retrieval.
///
/// Dense cosine scores concentrate near the top of the range for relevant
/// results; a high floor cuts weak semantic matches.
pub const MIN_SCORE_DENSE: f32 = 0.75;

/// Minimum score floor for sparse-only retrieval.
///
/// Sparse dot products live on a different scale than cosine similarity, so
/// the floor is much lower.
pub const MIN_SCORE_SPARSE: f32 = 0.1;

/// Minimum score floor for hybrid retrieval, applied to the effective score
/// after fusion.
pub const MIN_SCORE_HYBRID: f32 = 0.5;

/// Default number of candidates fed to the reranker before trimming to the
/// request limit.
pub const DEFAULT_RERANK_DEPTH: usize = 30;

/// Default per-call reranking timeout in milliseconds.
///
/// Expected tier latencies: fast ~10ms, colbert ~30ms, accurate/code ~50ms,
/// llm ~500ms. The llm tier carries its own, larger budget
/// ([`LLM_TIER_TIMEOUT_MS`]).
pub const RERANK_TIMEOUT_MS: u64 = 500;

/// Timeout override for the llm reranking tier in milliseconds.
pub const LLM_TIER_TIMEOUT_MS: u64 = 2_000;

/// Named dense vector for conversational text embeddings.
pub const TEXT_DENSE_FIELD: &str = "text_dense";

/// Named dense vector for code embeddings.
pub const CODE_DENSE_FIELD: &str = "code_dense";

/// Named sparse vector (lexical sparse weights).
pub const SPARSE_FIELD: &str = "text_sparse";

/// Named multi-vector field for late-interaction (ColBERT) embeddings.
pub const COLBERT_FIELD: &str = "text_colbert";

/// Default dimension of the dense text embedding space.
pub const TEXT_EMBEDDING_DIM: usize = 384;

/// Default dimension of the dense code embedding space.
pub const CODE_EMBEDDING_DIM: usize = 768;

/// Per-token vector dimension for late-interaction embeddings.
pub const COLBERT_EMBEDDING_DIM: usize = 128;

/// Sliding-window length for the LLM rerank rate limiter, in seconds.
pub const RATE_LIMIT_WINDOW_SECS: u64 = 3_600;

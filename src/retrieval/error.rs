use thiserror::Error;

#[derive(Debug, Error)]
/// Errors surfaced by the retrieval pipeline.
///
/// Partial failures degrade results instead of erroring; only conditions
/// that leave nothing to return reach the caller.
pub enum RetrievalError {
    /// The query carried no tenant id; retrieval refuses to touch the store.
    #[error("tenant id (filters.org_id) is required")]
    TenantMissing,

    /// Every retrieval leg failed; there is nothing to degrade to.
    #[error("retrieval failed: {reason}")]
    RetrievalFailed {
        /// Opaque reason; store-specific errors never leak through.
        reason: String,
    },

    /// An embedder the selected strategy requires is unavailable.
    #[error("embedder unavailable: {reason}")]
    EmbedderFailed {
        /// Error message.
        reason: String,
    },
}

use thiserror::Error;

#[derive(Debug, Error)]
/// Errors returned by the LLM provider seam.
pub enum LlmError {
    /// The provider did not answer within the deadline.
    #[error("llm request timed out: {reason}")]
    Timeout {
        /// Error message.
        reason: String,
    },

    /// The provider rejected the request for rate reasons.
    #[error("llm provider rate limited: {reason}")]
    RateLimited {
        /// Error message.
        reason: String,
    },

    /// The provider was unreachable.
    #[error("llm connection failed: {reason}")]
    Connection {
        /// Error message.
        reason: String,
    },

    /// The provider returned an API error.
    #[error("llm api error: {reason}")]
    Api {
        /// Error message.
        reason: String,
    },

    /// The provider answered with content the caller could not use.
    #[error("llm response invalid: {reason}")]
    InvalidResponse {
        /// Error message.
        reason: String,
    },
}

impl LlmError {
    /// Returns `true` when retrying the same request can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::Timeout { .. } | LlmError::RateLimited { .. } | LlmError::Connection { .. }
        )
    }
}

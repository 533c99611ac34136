//! LLM provider seam.
//!
//! The pipeline consumes one operation: [`LlmClient::generate`], a prompt ->
//! text oracle with token and cost accounting. [`GenAiClient`] is the
//! production implementation; tests script a [`MockLlmClient`].

pub mod client;
mod error;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(test)]
mod tests;

pub use client::{GenAiClient, RetryConfig};
pub use error::LlmError;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockLlmClient;

use async_trait::async_trait;

/// One generation request.
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    /// User prompt.
    pub prompt: String,
    /// Optional system instruction.
    pub system: Option<String>,
    /// Ask the provider for a JSON answer.
    pub json: bool,
}

impl LlmRequest {
    /// Builds a plain prompt request.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// Attaches a system instruction.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Requests JSON output.
    pub fn expect_json(mut self) -> Self {
        self.json = true;
        self
    }
}

/// Token and cost accounting for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LlmUsage {
    /// Tokens in the prompt.
    pub prompt_tokens: u32,
    /// Tokens in the completion.
    pub completion_tokens: u32,
    /// Prompt plus completion tokens.
    pub total_tokens: u32,
    /// Estimated cost in cents.
    pub cost_cents: f64,
}

/// One generation response.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Generated text.
    pub content: String,
    /// Model that produced it.
    pub model: String,
    /// Token/cost accounting.
    pub usage: LlmUsage,
}

/// Request/response oracle over an LLM provider.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generates a completion for the request.
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError>;
}

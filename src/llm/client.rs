use std::time::Duration;

use async_trait::async_trait;
use genai::Client;
use genai::chat::{ChatMessage, ChatRequest};
use tracing::{debug, warn};

use super::error::LlmError;
use super::{LlmClient, LlmRequest, LlmResponse, LlmUsage};

/// Input cost in cents per 1K prompt tokens (flash-class default).
const INPUT_COST_CENTS_PER_1K: f64 = 0.0075;

/// Output cost in cents per 1K completion tokens (flash-class default).
const OUTPUT_COST_CENTS_PER_1K: f64 = 0.03;

/// Retry policy for transient provider failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum attempts (first call included).
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each subsequent one.
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

/// Provider client over the `genai` multi-provider API.
pub struct GenAiClient {
    client: Client,
    model: String,
    retry: RetryConfig,
}

impl GenAiClient {
    /// Creates a client for `model` with the default retry policy.
    ///
    /// Provider credentials come from the environment the way `genai`
    /// resolves them (e.g. `GEMINI_API_KEY`, `OPENAI_API_KEY`).
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::default(),
            model: model.into(),
            retry: RetryConfig::default(),
        }
    }

    /// Overrides the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Model this client targets.
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn exec_once(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let mut messages = Vec::new();
        if let Some(ref system) = request.system {
            messages.push(ChatMessage::system(system.clone()));
        }

        let prompt = if request.json {
            format!("{}\n\nAnswer with JSON only, no prose.", request.prompt)
        } else {
            request.prompt.clone()
        };
        messages.push(ChatMessage::user(prompt));

        let chat_request = ChatRequest::new(messages);

        let response = self
            .client
            .exec_chat(&self.model, chat_request, None)
            .await
            .map_err(classify_error)?;

        let content = response
            .first_text()
            .map(|t| t.to_string())
            .ok_or_else(|| LlmError::InvalidResponse {
                reason: "provider returned no text content".to_string(),
            })?;

        let prompt_tokens = response.usage.prompt_tokens.unwrap_or(0).max(0) as u32;
        let completion_tokens = response.usage.completion_tokens.unwrap_or(0).max(0) as u32;
        let total_tokens = response
            .usage
            .total_tokens
            .unwrap_or((prompt_tokens + completion_tokens) as i32)
            .max(0) as u32;

        Ok(LlmResponse {
            content,
            model: self.model.clone(),
            usage: LlmUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens,
                cost_cents: estimate_cost_cents(prompt_tokens, completion_tokens),
            },
        })
    }
}

#[async_trait]
impl LlmClient for GenAiClient {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let mut delay = self.retry.base_delay;
        let mut last_error = None;

        for attempt in 1..=self.retry.max_attempts {
            match self.exec_once(&request).await {
                Ok(response) => {
                    debug!(
                        model = %response.model,
                        total_tokens = response.usage.total_tokens,
                        attempt,
                        "llm generation complete"
                    );
                    return Ok(response);
                }
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    warn!(error = %e, attempt, delay_ms = delay.as_millis() as u64, "transient llm failure, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(LlmError::Api {
            reason: "retry loop exhausted without an error".to_string(),
        }))
    }
}

/// Maps a provider error onto the typed taxonomy by its surface text; the
/// underlying crate folds provider-specific failures into one error type.
fn classify_error(error: genai::Error) -> LlmError {
    let reason = error.to_string();
    let lowered = reason.to_lowercase();

    if lowered.contains("timeout") || lowered.contains("timed out") {
        LlmError::Timeout { reason }
    } else if lowered.contains("rate") && lowered.contains("limit") || lowered.contains("429") {
        LlmError::RateLimited { reason }
    } else if lowered.contains("connect") || lowered.contains("dns") || lowered.contains("network")
    {
        LlmError::Connection { reason }
    } else {
        LlmError::Api { reason }
    }
}

/// Estimated request cost in cents from token counts.
pub fn estimate_cost_cents(prompt_tokens: u32, completion_tokens: u32) -> f64 {
    prompt_tokens as f64 / 1_000.0 * INPUT_COST_CENTS_PER_1K
        + completion_tokens as f64 / 1_000.0 * OUTPUT_COST_CENTS_PER_1K
}

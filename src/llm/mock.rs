//! Scripted [`LlmClient`] for tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::error::LlmError;
use super::{LlmClient, LlmRequest, LlmResponse, LlmUsage};

/// Mock client returning scripted responses in order; replays the last
/// scripted entry when the script runs dry, and fails when never scripted.
#[derive(Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    last: Mutex<Option<LlmResponse>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    /// Creates an unscripted client (every call fails).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a client that always answers `content`.
    pub fn answering(content: impl Into<String>) -> Self {
        let mock = Self::new();
        mock.push_text(content);
        mock
    }

    /// Queues a plain text response.
    pub fn push_text(&self, content: impl Into<String>) {
        self.push_response(LlmResponse {
            content: content.into(),
            model: "mock".to_string(),
            usage: LlmUsage {
                prompt_tokens: 100,
                completion_tokens: 50,
                total_tokens: 150,
                cost_cents: 0.5,
            },
        });
    }

    /// Queues a full response.
    pub fn push_response(&self, response: LlmResponse) {
        self.script.lock().push_back(Ok(response));
    }

    /// Queues a failure.
    pub fn push_error(&self, error: LlmError) {
        self.script.lock().push_back(Err(error));
    }

    /// Requests seen so far, in call order.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().clone()
    }

    /// Number of calls made.
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().push(request);

        if let Some(scripted) = self.script.lock().pop_front() {
            if let Ok(ref response) = scripted {
                *self.last.lock() = Some(response.clone());
            }
            return scripted;
        }

        self.last.lock().clone().ok_or(LlmError::Api {
            reason: "mock llm has no scripted response".to_string(),
        })
    }
}

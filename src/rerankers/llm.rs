//! Llm tier: listwise reranking through the provider seam.
//!
//! Sends the query plus numbered candidate snippets and asks for a JSON
//! array of candidate indices ordered by relevance. The response is parsed
//! leniently (first JSON array found); indices the model omitted keep their
//! original relative order at the tail.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::llm::client::estimate_cost_cents;
use crate::llm::{LlmClient, LlmRequest, LlmUsage};

use super::error::RerankError;
use super::{RankedResult, Reranker};

const SYSTEM_PROMPT: &str = "You rank search results. Given a query and numbered candidate \
passages, answer with a JSON array of candidate numbers ordered from most to least relevant. \
Answer with the JSON array only.";

/// Longest candidate snippet included in the prompt, in characters.
const SNIPPET_CHARS: usize = 300;

/// Listwise LLM reranker.
pub struct LlmReranker {
    client: Arc<dyn LlmClient>,
}

impl LlmReranker {
    /// Creates the tier over a provider client.
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    /// Cost estimate used for rate-limiter admission, in cents.
    pub fn estimate_cost(&self, query: &str, documents: &[String]) -> f64 {
        let prompt_chars: usize = query.len()
            + documents
                .iter()
                .map(|d| d.len().min(SNIPPET_CHARS) + 8)
                .sum::<usize>()
            + SYSTEM_PROMPT.len();

        // Rough 4-chars-per-token estimate; completion is a short index list.
        estimate_cost_cents((prompt_chars / 4) as u32, 64)
    }

    /// Reranks and reports the provider usage for cost accounting.
    pub async fn rerank_with_usage(
        &self,
        query: &str,
        documents: &[String],
        top_k: Option<usize>,
    ) -> Result<(Vec<RankedResult>, LlmUsage), RerankError> {
        if documents.is_empty() {
            return Ok((vec![], LlmUsage::default()));
        }

        let prompt = build_prompt(query, documents);
        let request = LlmRequest::new(prompt)
            .with_system(SYSTEM_PROMPT)
            .expect_json();

        let response = self.client.generate(request).await?;

        let order = parse_index_list(&response.content, documents.len()).ok_or_else(|| {
            RerankError::InvalidResponse {
                reason: format!(
                    "no usable index list in llm response: {}",
                    response.content.chars().take(120).collect::<String>()
                ),
            }
        })?;

        debug!(
            ranked = order.len(),
            total = documents.len(),
            tokens = response.usage.total_tokens,
            "llm listwise rerank complete"
        );

        let mut results: Vec<RankedResult> = Vec::with_capacity(documents.len());
        let span = documents.len() as f32;

        for (rank, index) in order.iter().enumerate() {
            results.push(RankedResult {
                text: documents[*index].clone(),
                score: 1.0 - rank as f32 / span,
                original_index: *index,
            });
        }

        // Candidates the model skipped keep their original relative order.
        for (index, text) in documents.iter().enumerate() {
            if !order.contains(&index) {
                results.push(RankedResult {
                    text: text.clone(),
                    score: 0.0,
                    original_index: index,
                });
            }
        }

        if let Some(top_k) = top_k {
            results.truncate(top_k);
        }

        Ok((results, response.usage))
    }
}

#[async_trait]
impl Reranker for LlmReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_k: Option<usize>,
    ) -> Result<Vec<RankedResult>, RerankError> {
        let (results, _) = self.rerank_with_usage(query, documents, top_k).await?;
        Ok(results)
    }
}

fn build_prompt(query: &str, documents: &[String]) -> String {
    let mut prompt = format!("Query: {query}\n\nCandidates:\n");

    for (index, document) in documents.iter().enumerate() {
        let snippet: String = document.chars().take(SNIPPET_CHARS).collect();
        prompt.push_str(&format!("{index}. {snippet}\n"));
    }

    prompt.push_str("\nReturn the candidate numbers ordered by relevance to the query.");
    prompt
}

/// Extracts the first JSON array of indices from `content`, deduplicated and
/// bounds-checked. Returns `None` when no valid array is present.
fn parse_index_list(content: &str, len: usize) -> Option<Vec<usize>> {
    let start = content.find('[')?;
    let end = content[start..].find(']')? + start;

    let parsed: Vec<serde_json::Value> = serde_json::from_str(&content[start..=end]).ok()?;

    let mut seen = vec![false; len];
    let mut order = Vec::new();

    for value in parsed {
        let index = value.as_u64()? as usize;
        if index < len && !seen[index] {
            seen[index] = true;
            order.push(index);
        }
    }

    (!order.is_empty()).then_some(order)
}

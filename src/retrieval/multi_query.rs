//! Multi-query expansion retriever.
//!
//! Expands the input into paraphrase / keyword / step-back variants through
//! the LLM seam, searches every variant in parallel, and fuses the result
//! sets with RRF. Expansion failure falls back to the original query with
//! degraded markers; individual variant failures are absorbed.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::llm::{LlmClient, LlmRequest};
use crate::rerankers::RerankerRouter;

use super::error::RetrievalError;
use super::fusion::rrf_fuse;
use super::retriever::{HybridRetriever, rerank_results};
use super::types::{SearchQuery, SearchResultItem};

/// Expansion tuning.
#[derive(Debug, Clone)]
pub struct MultiQueryConfig {
    /// Number of generated variants.
    pub num_variations: usize,
    /// Reformulation styles requested from the model.
    pub strategies: Vec<String>,
    /// Search the original query as an extra variant.
    pub include_original: bool,
    /// RRF constant for fusing variant result sets.
    pub rrf_k: usize,
}

impl Default for MultiQueryConfig {
    fn default() -> Self {
        Self {
            num_variations: 3,
            strategies: vec![
                "paraphrase".to_string(),
                "keyword".to_string(),
                "stepback".to_string(),
            ],
            include_original: true,
            rrf_k: crate::constants::RRF_K,
        }
    }
}

/// Accumulated LLM usage across expansions.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExpansionUsage {
    /// Prompt plus completion tokens.
    pub total_tokens: u64,
    /// Estimated cost in cents.
    pub total_cost_cents: f64,
    /// Number of expansion calls.
    pub expansions: u64,
}

/// Retriever wrapper that searches several query formulations.
pub struct MultiQueryRetriever {
    base: Arc<HybridRetriever>,
    router: Arc<RerankerRouter>,
    llm: Arc<dyn LlmClient>,
    config: MultiQueryConfig,
    usage: Mutex<ExpansionUsage>,
}

impl MultiQueryRetriever {
    /// Creates the retriever over the base retriever and an LLM client.
    pub fn new(
        base: Arc<HybridRetriever>,
        router: Arc<RerankerRouter>,
        llm: Arc<dyn LlmClient>,
        config: MultiQueryConfig,
    ) -> Self {
        Self {
            base,
            router,
            llm,
            config,
            usage: Mutex::new(ExpansionUsage::default()),
        }
    }

    /// Accumulated usage snapshot.
    pub fn usage(&self) -> ExpansionUsage {
        *self.usage.lock()
    }

    /// Clears the usage accumulator.
    pub fn reset_usage(&self) {
        *self.usage.lock() = ExpansionUsage::default();
    }

    /// Builds the expansion prompt for `query`.
    pub fn build_expansion_prompt(&self, query: &str) -> String {
        let styles: Vec<String> = self
            .config
            .strategies
            .iter()
            .map(|s| match s.as_str() {
                "paraphrase" => "- Paraphrase: restate the query with different wording".to_string(),
                "keyword" => "- Keyword: reduce the query to its essential search terms".to_string(),
                "stepback" => {
                    "- Step-back: generalise the query to its underlying topic".to_string()
                }
                other => format!("- {other}"),
            })
            .collect();

        format!(
            "Generate {count} alternative formulations of this search query.\n\
             Use these styles:\n{styles}\n\n\
             Query: {query}\n\n\
             Answer with a JSON array of {count} strings.",
            count = self.config.num_variations,
            styles = styles.join("\n"),
        )
    }

    /// Expands `query` into up to `num_variations` reformulations.
    pub async fn expand_query(&self, query: &str) -> Result<Vec<String>, RetrievalError> {
        let request = LlmRequest::new(self.build_expansion_prompt(query))
            .with_system("You reformulate search queries for retrieval. Answer with JSON only.")
            .expect_json();

        let response =
            self.llm
                .generate(request)
                .await
                .map_err(|e| RetrievalError::RetrievalFailed {
                    reason: format!("query expansion failed: {e}"),
                })?;

        {
            let mut usage = self.usage.lock();
            usage.total_tokens += response.usage.total_tokens as u64;
            usage.total_cost_cents += response.usage.cost_cents;
            usage.expansions += 1;
        }

        let variants = parse_variants(&response.content, self.config.num_variations).ok_or_else(
            || RetrievalError::RetrievalFailed {
                reason: "query expansion returned no usable variants".to_string(),
            },
        )?;

        debug!(count = variants.len(), "query expansion complete");
        Ok(variants)
    }

    /// Searches every formulation and fuses the result sets.
    pub async fn search(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<SearchResultItem>, RetrievalError> {
        // Tenant isolation comes first; expansion must not spend tokens on a
        // query that can never reach the store.
        if query
            .filters
            .as_ref()
            .is_none_or(|f| f.org_id.is_empty())
        {
            return Err(RetrievalError::TenantMissing);
        }

        let variants = match self.expand_query(&query.text).await {
            Ok(variants) => variants,
            Err(e) => {
                warn!(error = %e, "expansion failed, falling back to the original query");
                let mut results = self.base.search(query).await?;
                for item in &mut results {
                    item.mark_degraded("expansion_failed");
                }
                return Ok(results);
            }
        };

        let mut all_texts = variants;
        if self.config.include_original {
            all_texts.push(query.text.clone());
        }

        // Variant searches skip per-variant reranking; one routed rerank runs
        // over the fused set instead.
        let searches = all_texts.iter().map(|text| {
            let variant = SearchQuery {
                text: text.clone(),
                rerank: false,
                ..query.clone()
            };
            async move { self.base.search(&variant).await }
        });

        let outcomes = futures_util::future::join_all(searches).await;

        let mut result_sets = Vec::new();
        for (text, outcome) in all_texts.iter().zip(outcomes) {
            match outcome {
                Ok(results) => result_sets.push(results),
                Err(e) => {
                    warn!(variant = %text, error = %e, "variant search failed, absorbing");
                }
            }
        }

        if result_sets.is_empty() {
            return Err(RetrievalError::RetrievalFailed {
                reason: "every variant search failed".to_string(),
            });
        }

        let mut fused = rrf_fuse(result_sets, self.config.rrf_k);

        if query.rerank {
            fused = rerank_results(
                &self.router,
                &query.text,
                fused,
                query.rerank_tier,
                query.rerank_depth,
            )
            .await;
        }

        fused.truncate(query.limit);
        Ok(fused)
    }
}

/// Parses a JSON array of strings out of the model answer, keeping at most
/// `max` non-empty variants.
fn parse_variants(content: &str, max: usize) -> Option<Vec<String>> {
    let start = content.find('[')?;
    let end = content[start..].rfind(']')? + start;

    let parsed: Vec<serde_json::Value> = serde_json::from_str(&content[start..=end]).ok()?;

    let variants: Vec<String> = parsed
        .into_iter()
        .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
        .filter(|s| !s.is_empty())
        .take(max)
        .collect();

    (!variants.is_empty()).then_some(variants)
}

#[cfg(test)]
mod parse_tests {
    use super::parse_variants;

    #[test]
    fn test_parses_string_array() {
        assert_eq!(
            parse_variants(r#"["one", "two", "three", "four"]"#, 3),
            Some(vec!["one".to_string(), "two".to_string(), "three".to_string()])
        );
    }

    #[test]
    fn test_parses_array_inside_prose() {
        assert_eq!(
            parse_variants("Here you go: [\"a\", \"b\"] hope that helps", 5),
            Some(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_rejects_non_arrays_and_empties() {
        assert_eq!(parse_variants("no json at all", 3), None);
        assert_eq!(parse_variants("[]", 3), None);
        assert_eq!(parse_variants("[1, 2, 3]", 3), None);
        assert_eq!(parse_variants(r#"["", "  "]"#, 3), None);
    }
}

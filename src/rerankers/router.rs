//! Tier selection, timeout enforcement, and fallback.
//!
//! Selection precedence: explicit override, code-syntax queries to the code
//! tier, complex queries to accurate, moderate to accurate (or colbert when
//! configured), everything else to fast. The llm tier never gets selected
//! implicitly; it must be requested and then admitted by the rate limiter.
//!
//! Whatever a tier does - time out, error, get rate limited - the router
//! answers with the original ordering and degraded markers. Reranking is an
//! enhancement, never a failure source for the request.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::constants::{LLM_TIER_TIMEOUT_MS, RERANK_TIMEOUT_MS};
use crate::ratelimit::SlidingWindowRateLimiter;
use crate::retrieval::classifier::QueryClassifier;
use crate::retrieval::types::{QueryComplexity, RerankerTier};

use super::llm::LlmReranker;
use super::{RankedResult, Reranker};

/// Router tuning.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Per-call timeout for model tiers.
    pub timeout: Duration,
    /// Per-call timeout for the llm tier.
    pub llm_timeout: Duration,
    /// Send moderate-complexity queries to colbert instead of accurate.
    pub moderate_tier_colbert: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(RERANK_TIMEOUT_MS),
            llm_timeout: Duration::from_millis(LLM_TIER_TIMEOUT_MS),
            moderate_tier_colbert: false,
        }
    }
}

/// The reranking tiers a router dispatches over.
pub struct TierSet {
    /// Fast lexical tier.
    pub fast: Arc<dyn Reranker>,
    /// Accurate cross-encoder tier.
    pub accurate: Arc<dyn Reranker>,
    /// Code cross-encoder tier.
    pub code: Arc<dyn Reranker>,
    /// Late-interaction tier.
    pub colbert: Arc<dyn Reranker>,
    /// Listwise llm tier, when a provider is wired.
    pub llm: Option<Arc<LlmReranker>>,
}

impl TierSet {
    /// Builds the tier set from service configuration: lexical fast tier,
    /// cross-encoders from their configured model directories (stub mode
    /// when unset), MaxSim over the shared ColBERT embedder, and the llm
    /// tier when a provider client is supplied.
    pub fn from_config(
        config: &crate::config::Config,
        colbert_embedder: Arc<crate::embedding::ColbertEmbedder>,
        llm_client: Option<Arc<dyn crate::llm::LlmClient>>,
    ) -> Result<Self, super::RerankError> {
        use super::cross_encoder::{CrossEncoderConfig, CrossEncoderReranker};

        let accurate = CrossEncoderReranker::load(CrossEncoderConfig {
            model_path: config.reranker_accurate_path.clone(),
            ..CrossEncoderConfig::default()
        })?;

        let code = CrossEncoderReranker::load(CrossEncoderConfig {
            model_path: config.reranker_code_path.clone(),
            ..CrossEncoderConfig::default()
        })?;

        Ok(Self {
            fast: Arc::new(super::lexical::LexicalReranker::new()),
            accurate: Arc::new(accurate),
            code: Arc::new(code),
            colbert: Arc::new(super::colbert::ColbertReranker::new(colbert_embedder)),
            llm: llm_client.map(|client| Arc::new(LlmReranker::new(client))),
        })
    }
}

/// Result of a routed rerank; never an error.
#[derive(Debug, Clone)]
pub struct RerankOutcome {
    /// Ranked results; the original ordering when degraded.
    pub results: Vec<RankedResult>,
    /// Tier the router selected.
    pub tier: RerankerTier,
    /// A fallback path produced these results.
    pub degraded: bool,
    /// Why the fallback engaged.
    pub degraded_reason: Option<String>,
}

/// Tier router with timeout-bounded execution and ordering fallback.
pub struct RerankerRouter {
    tiers: TierSet,
    limiter: Arc<SlidingWindowRateLimiter>,
    classifier: QueryClassifier,
    config: RouterConfig,
}

impl RerankerRouter {
    /// Creates a router.
    pub fn new(
        tiers: TierSet,
        limiter: Arc<SlidingWindowRateLimiter>,
        config: RouterConfig,
    ) -> Self {
        Self {
            tiers,
            limiter,
            classifier: QueryClassifier::new(),
            config,
        }
    }

    /// Applies the tier selection policy.
    pub fn select_tier(&self, query: &str, tier_override: Option<RerankerTier>) -> RerankerTier {
        if let Some(tier) = tier_override {
            return tier;
        }

        if self.classifier.is_code_query(query) {
            return RerankerTier::Code;
        }

        match self.classifier.classify(query).complexity {
            QueryComplexity::Complex => RerankerTier::Accurate,
            QueryComplexity::Moderate if self.config.moderate_tier_colbert => RerankerTier::Colbert,
            QueryComplexity::Moderate => RerankerTier::Accurate,
            QueryComplexity::Simple => RerankerTier::Fast,
        }
    }

    /// Reranks `documents`, falling back to the input ordering on failure.
    pub async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        tier_override: Option<RerankerTier>,
        top_k: Option<usize>,
    ) -> RerankOutcome {
        let tier = self.select_tier(query, tier_override);

        if documents.is_empty() {
            return RerankOutcome {
                results: vec![],
                tier,
                degraded: false,
                degraded_reason: None,
            };
        }

        debug!(%tier, num_candidates = documents.len(), "Routing rerank");

        match tier {
            RerankerTier::Llm => self.rerank_llm(query, documents, top_k).await,
            _ => {
                let reranker = match tier {
                    RerankerTier::Fast => &self.tiers.fast,
                    RerankerTier::Accurate => &self.tiers.accurate,
                    RerankerTier::Code => &self.tiers.code,
                    RerankerTier::Colbert => &self.tiers.colbert,
                    RerankerTier::Llm => unreachable!("handled above"),
                };

                self.run_tier(tier, reranker.as_ref(), query, documents, top_k, self.config.timeout)
                    .await
            }
        }
    }

    async fn rerank_llm(
        &self,
        query: &str,
        documents: &[String],
        top_k: Option<usize>,
    ) -> RerankOutcome {
        let Some(ref llm) = self.tiers.llm else {
            warn!("llm tier requested but no provider is wired");
            return self.fallback(documents, RerankerTier::Llm, "rerank_failed: llm unavailable");
        };

        let cost = llm.estimate_cost(query, documents);
        if let Err(e) = self.limiter.check_and_record(cost) {
            warn!(error = %e, retry_after_secs = e.retry_after().as_secs(), "llm rerank rejected by rate limiter");
            return self.fallback(documents, RerankerTier::Llm, "rate_limited: llm");
        }

        self.run_tier(
            RerankerTier::Llm,
            llm.as_ref(),
            query,
            documents,
            top_k,
            self.config.llm_timeout,
        )
        .await
    }

    async fn run_tier(
        &self,
        tier: RerankerTier,
        reranker: &dyn Reranker,
        query: &str,
        documents: &[String],
        top_k: Option<usize>,
        timeout: Duration,
    ) -> RerankOutcome {
        match tokio::time::timeout(timeout, reranker.rerank(query, documents, top_k)).await {
            Ok(Ok(results)) => RerankOutcome {
                results,
                tier,
                degraded: false,
                degraded_reason: None,
            },
            Ok(Err(e)) => {
                warn!(%tier, error = %e, "Rerank tier failed, returning original ordering");
                self.fallback(documents, tier, &format!("rerank_failed: {tier}"))
            }
            Err(_) => {
                warn!(%tier, timeout_ms = timeout.as_millis() as u64, "Rerank tier timed out, returning original ordering");
                self.fallback(documents, tier, &format!("rerank_timeout: {tier}"))
            }
        }
    }

    fn fallback(&self, documents: &[String], tier: RerankerTier, reason: &str) -> RerankOutcome {
        let results = documents
            .iter()
            .enumerate()
            .map(|(original_index, text)| RankedResult {
                text: text.clone(),
                score: 0.0,
                original_index,
            })
            .collect();

        RerankOutcome {
            results,
            tier,
            degraded: true,
            degraded_reason: Some(reason.to_string()),
        }
    }
}

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::embedding::{ColbertConfig, ColbertEmbedder};
use crate::llm::{LlmError, MockLlmClient};
use crate::ratelimit::SlidingWindowRateLimiter;
use crate::retrieval::types::RerankerTier;

use super::colbert::maxsim;
use super::*;

fn docs(texts: &[&str]) -> Vec<String> {
    texts.iter().map(|t| t.to_string()).collect()
}

fn default_tiers() -> TierSet {
    let colbert = Arc::new(ColbertEmbedder::new(ColbertConfig::stub(64)).unwrap());
    TierSet {
        fast: Arc::new(LexicalReranker::new()),
        accurate: Arc::new(CrossEncoderReranker::load(CrossEncoderConfig::default()).unwrap()),
        code: Arc::new(CrossEncoderReranker::load(CrossEncoderConfig::default()).unwrap()),
        colbert: Arc::new(ColbertReranker::new(colbert)),
        llm: None,
    }
}

fn router_with(tiers: TierSet, limiter: Arc<SlidingWindowRateLimiter>) -> RerankerRouter {
    RerankerRouter::new(tiers, limiter, RouterConfig::default())
}

struct SlowReranker {
    delay: Duration,
}

#[async_trait]
impl Reranker for SlowReranker {
    async fn rerank(
        &self,
        _query: &str,
        documents: &[String],
        _top_k: Option<usize>,
    ) -> Result<Vec<RankedResult>, RerankError> {
        tokio::time::sleep(self.delay).await;
        Ok(documents
            .iter()
            .enumerate()
            .map(|(i, t)| RankedResult {
                text: t.clone(),
                score: 1.0,
                original_index: i,
            })
            .collect())
    }
}

struct FailingReranker;

#[async_trait]
impl Reranker for FailingReranker {
    async fn rerank(
        &self,
        _query: &str,
        _documents: &[String],
        _top_k: Option<usize>,
    ) -> Result<Vec<RankedResult>, RerankError> {
        Err(RerankError::Inference {
            reason: "injected failure".to_string(),
        })
    }
}

#[tokio::test]
async fn test_lexical_reranker_prefers_overlapping_candidate() {
    let reranker = LexicalReranker::new();

    let results = reranker
        .rerank(
            "rust borrow checker",
            &docs(&[
                "a cooking recipe for pancakes",
                "notes on the rust borrow checker",
            ]),
            None,
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].original_index, 1);
    assert!(results[0].score > results[1].score);
}

#[tokio::test]
async fn test_lexical_reranker_top_k() {
    let reranker = LexicalReranker::new();

    let results = reranker
        .rerank("query", &docs(&["a", "b", "c", "d"]), Some(2))
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn test_cross_encoder_stub_mode_ranks_lexically() {
    let reranker = CrossEncoderReranker::load(CrossEncoderConfig::default()).unwrap();
    assert!(!reranker.is_model_loaded());

    let results = reranker
        .rerank(
            "tokio spawn",
            &docs(&["unrelated text entirely", "how tokio spawn works"]),
            None,
        )
        .await
        .unwrap();

    assert_eq!(results[0].original_index, 1);
}

#[test]
fn test_cross_encoder_missing_model_dir_fails() {
    let result = CrossEncoderReranker::load(CrossEncoderConfig {
        model_path: Some(std::path::PathBuf::from("/nonexistent/cross-encoder")),
        ..CrossEncoderConfig::default()
    });

    assert!(result.is_err());
}

#[test]
fn test_maxsim_scoring() {
    let query = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
    let matching = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
    let orthogonal = vec![vec![-1.0, 0.0]];

    assert!((maxsim(&query, &matching) - 1.0).abs() < 1e-6);
    assert!(maxsim(&query, &orthogonal) < maxsim(&query, &matching));
    assert_eq!(maxsim(&[], &matching), 0.0);
    assert_eq!(maxsim(&query, &[]), 0.0);
}

#[tokio::test]
async fn test_colbert_reranker_returns_all_candidates_sorted() {
    let embedder = Arc::new(ColbertEmbedder::new(ColbertConfig::stub(32)).unwrap());
    let reranker = ColbertReranker::new(embedder);

    let results = reranker
        .rerank("alpha beta", &docs(&["alpha beta", "gamma delta", "alpha"]), None)
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    // Identical text maximises MaxSim under deterministic stub embeddings.
    assert_eq!(results[0].original_index, 0);
}

#[tokio::test]
async fn test_llm_reranker_applies_model_order() {
    let mock = Arc::new(MockLlmClient::answering("[2, 0, 1]"));
    let reranker = LlmReranker::new(mock);

    let (results, usage) = reranker
        .rerank_with_usage("q", &docs(&["a", "b", "c"]), None)
        .await
        .unwrap();

    assert_eq!(
        results.iter().map(|r| r.original_index).collect::<Vec<_>>(),
        vec![2, 0, 1]
    );
    assert!(results[0].score > results[1].score);
    assert!(usage.total_tokens > 0);
}

#[tokio::test]
async fn test_llm_reranker_appends_omitted_candidates() {
    let mock = Arc::new(MockLlmClient::answering("[1]"));
    let reranker = LlmReranker::new(mock);

    let results = reranker.rerank("q", &docs(&["a", "b", "c"]), None).await.unwrap();

    assert_eq!(
        results.iter().map(|r| r.original_index).collect::<Vec<_>>(),
        vec![1, 0, 2]
    );
}

#[tokio::test]
async fn test_llm_reranker_rejects_unparseable_answer() {
    let mock = Arc::new(MockLlmClient::answering("I cannot rank these."));
    let reranker = LlmReranker::new(mock);

    let result = reranker.rerank("q", &docs(&["a", "b"]), None).await;
    assert!(matches!(result, Err(RerankError::InvalidResponse { .. })));
}

#[test]
fn test_tier_selection_policy() {
    let limiter = Arc::new(SlidingWindowRateLimiter::new(10, 1_000));
    let router = router_with(default_tiers(), limiter);

    // Explicit override wins.
    assert_eq!(
        router.select_tier("anything", Some(RerankerTier::Llm)),
        RerankerTier::Llm
    );

    // Code syntax routes to the code tier.
    assert_eq!(
        router.select_tier("how does tokio.spawn( work", None),
        RerankerTier::Code
    );

    // Short keyword queries go fast.
    assert_eq!(router.select_tier("docker", None), RerankerTier::Fast);

    // A long operator-heavy question is complex, so accurate.
    let complex = "what is the best way to configure AND tune the retry budget for \
                   our ingestion pipeline when the broker keeps redelivering";
    assert_eq!(router.select_tier(complex, None), RerankerTier::Accurate);
}

#[test]
fn test_moderate_tier_colbert_switch() {
    let limiter = Arc::new(SlidingWindowRateLimiter::new(10, 1_000));
    let config = RouterConfig {
        moderate_tier_colbert: true,
        ..RouterConfig::default()
    };
    let router = RerankerRouter::new(default_tiers(), limiter, config);

    // "how to configure the retry budget" scores moderate (question + length).
    let moderate = "how to configure the retry budget cleanly";
    assert_eq!(router.select_tier(moderate, None), RerankerTier::Colbert);
}

#[tokio::test]
async fn test_router_timeout_returns_degraded_original_order() {
    let limiter = Arc::new(SlidingWindowRateLimiter::new(10, 1_000));
    let mut tiers = default_tiers();
    tiers.accurate = Arc::new(SlowReranker {
        delay: Duration::from_millis(200),
    });

    let config = RouterConfig {
        timeout: Duration::from_millis(50),
        ..RouterConfig::default()
    };
    let router = RerankerRouter::new(tiers, limiter, config);

    let outcome = router
        .rerank("q", &docs(&["a", "b", "c"]), Some(RerankerTier::Accurate), None)
        .await;

    assert!(outcome.degraded);
    assert!(
        outcome
            .degraded_reason
            .as_deref()
            .unwrap()
            .starts_with("rerank_timeout")
    );
    assert_eq!(
        outcome.results.iter().map(|r| r.original_index).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
}

#[tokio::test]
async fn test_router_tier_failure_returns_degraded_original_order() {
    let limiter = Arc::new(SlidingWindowRateLimiter::new(10, 1_000));
    let mut tiers = default_tiers();
    tiers.fast = Arc::new(FailingReranker);

    let router = router_with(tiers, limiter);

    let outcome = router.rerank("q", &docs(&["a", "b"]), Some(RerankerTier::Fast), None).await;

    assert!(outcome.degraded);
    assert!(
        outcome
            .degraded_reason
            .as_deref()
            .unwrap()
            .starts_with("rerank_failed")
    );
}

#[tokio::test]
async fn test_router_llm_tier_gated_by_rate_limiter() {
    // Zero-request cap: every llm rerank is rejected.
    let limiter = Arc::new(SlidingWindowRateLimiter::new(0, 1_000));
    let mut tiers = default_tiers();
    tiers.llm = Some(Arc::new(LlmReranker::new(Arc::new(MockLlmClient::answering(
        "[0]",
    )))));

    let router = router_with(tiers, limiter);

    let outcome = router.rerank("q", &docs(&["a"]), Some(RerankerTier::Llm), None).await;

    assert!(outcome.degraded);
    assert_eq!(outcome.degraded_reason.as_deref(), Some("rate_limited: llm"));
}

#[tokio::test]
async fn test_router_llm_tier_success_records_admission() {
    let limiter = Arc::new(SlidingWindowRateLimiter::new(10, 1_000));
    let mock = Arc::new(MockLlmClient::answering("[1, 0]"));
    let mut tiers = default_tiers();
    tiers.llm = Some(Arc::new(LlmReranker::new(mock)));

    let router = router_with(tiers, Arc::clone(&limiter));

    let outcome = router
        .rerank("q", &docs(&["a", "b"]), Some(RerankerTier::Llm), None)
        .await;

    assert!(!outcome.degraded);
    assert_eq!(outcome.tier, RerankerTier::Llm);
    assert_eq!(outcome.results[0].original_index, 1);
    assert_eq!(limiter.usage().request_count, 1);
}

#[tokio::test]
async fn test_router_llm_tier_unavailable_degrades() {
    let limiter = Arc::new(SlidingWindowRateLimiter::new(10, 1_000));
    let router = router_with(default_tiers(), limiter);

    let outcome = router.rerank("q", &docs(&["a"]), Some(RerankerTier::Llm), None).await;

    assert!(outcome.degraded);
    assert!(outcome.degraded_reason.as_deref().unwrap().starts_with("rerank_failed"));
}

#[tokio::test]
async fn test_llm_failure_inside_router_degrades() {
    let limiter = Arc::new(SlidingWindowRateLimiter::new(10, 1_000));
    let mock = Arc::new(MockLlmClient::new());
    mock.push_error(LlmError::Api {
        reason: "boom".to_string(),
    });

    let mut tiers = default_tiers();
    tiers.llm = Some(Arc::new(LlmReranker::new(mock)));
    let router = router_with(tiers, limiter);

    let outcome = router.rerank("q", &docs(&["a", "b"]), Some(RerankerTier::Llm), None).await;

    assert!(outcome.degraded);
    assert_eq!(
        outcome.results.iter().map(|r| r.original_index).collect::<Vec<_>>(),
        vec![0, 1]
    );
}

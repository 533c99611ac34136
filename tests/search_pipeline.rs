//! End-to-end read-path tests: documents indexed through the real indexer,
//! then retrieved through the full pipeline over the in-memory store.

use std::sync::Arc;

use recall::{
    BatchConfig, BatchQueue, BatchSink, ColbertConfig, DenseConfig, Document, DocumentIndexer,
    EmbedderRegistry, HybridRetriever, IndexerConfig, MockLlmClient, MockVectorStore,
    MultiQueryConfig, MultiQueryRetriever, RegistryConfig, RerankerRouter, RerankerTier,
    RetrieverConfig, RouterConfig, SearchFilters, SearchQuery, SessionAwareRetriever,
    SessionRetrieverConfig, SlidingWindowRateLimiter, SparseConfig, StorePoint, TierSet,
    VectorStore,
};

struct Pipeline {
    store: Arc<MockVectorStore>,
    registry: Arc<EmbedderRegistry>,
    router: Arc<RerankerRouter>,
    retriever: Arc<HybridRetriever>,
    indexer: Arc<DocumentIndexer>,
}

async fn pipeline() -> Pipeline {
    let store = Arc::new(MockVectorStore::new());
    let registry = Arc::new(EmbedderRegistry::new(RegistryConfig {
        text: DenseConfig::stub(64),
        code: DenseConfig::stub(32),
        sparse: SparseConfig::default(),
        colbert: ColbertConfig::stub(16),
    }));

    let colbert = registry.colbert().await.unwrap();
    let limiter = Arc::new(SlidingWindowRateLimiter::new(100, 10_000));
    let tiers = TierSet::from_config(&recall::Config::default(), colbert, None).unwrap();
    let router = Arc::new(RerankerRouter::new(tiers, limiter, RouterConfig::default()));

    let retriever = Arc::new(HybridRetriever::new(
        Arc::clone(&store) as Arc<dyn VectorStore>,
        Arc::clone(&registry),
        Arc::clone(&router),
        RetrieverConfig {
            min_score_dense: 0.0,
            min_score_sparse: 0.0,
            min_score_hybrid: 0.0,
            ..RetrieverConfig::default()
        },
    ));

    let indexer = Arc::new(DocumentIndexer::new(
        Arc::clone(&store) as Arc<dyn VectorStore>,
        Arc::clone(&registry),
        IndexerConfig::default(),
    ));

    Pipeline {
        store,
        registry,
        router,
        retriever,
        indexer,
    }
}

fn document(id: &str, content: &str, session: Option<&str>) -> Document {
    Document {
        id: id.to_string(),
        content: content.to_string(),
        org_id: "org-1".to_string(),
        metadata: serde_json::Map::new(),
        session_id: session.map(|s| s.to_string()),
    }
}

async fn index_corpus(p: &Pipeline) {
    let count = p
        .indexer
        .index_batch(vec![
            document("kafka", "kafka consumer group rebalancing strategies", None),
            document("tokio", "tokio runtime worker thread configuration", None),
            document("recipe", "grandmother pancake recipe with maple syrup", None),
        ])
        .await
        .unwrap();
    assert_eq!(count, 3);
}

#[tokio::test]
async fn test_indexed_documents_are_retrievable_by_keywords() {
    let p = pipeline().await;
    index_corpus(&p).await;

    let mut query = SearchQuery::new("kafka consumer rebalancing").for_org("org-1");
    query.threshold = 0.0;
    query.rerank = false;

    let results = p.retriever.search(&query).await.unwrap();

    assert!(!results.is_empty());
    assert_eq!(results[0].id.to_string(), "kafka");
    // Hybrid fan-out fused both legs.
    assert!(results[0].rrf_score.is_some());
    assert!(results.len() <= query.limit);
}

#[tokio::test]
async fn test_reranked_search_prefers_lexical_match() {
    let p = pipeline().await;
    index_corpus(&p).await;

    let mut query = SearchQuery::new("pancake recipe maple syrup").for_org("org-1");
    query.threshold = 0.0;
    query.rerank = true;
    query.rerank_tier = Some(RerankerTier::Fast);

    let results = p.retriever.search(&query).await.unwrap();

    assert_eq!(results[0].id.to_string(), "recipe");
    assert!(results[0].reranker_score.is_some());
    assert_eq!(results[0].rerank_tier, Some(RerankerTier::Fast));
}

#[tokio::test]
async fn test_tenant_isolation_end_to_end() {
    let p = pipeline().await;
    index_corpus(&p).await;

    // Another tenant sees nothing.
    let mut query = SearchQuery::new("kafka consumer rebalancing").for_org("org-2");
    query.threshold = 0.0;
    query.rerank = false;

    let results = p.retriever.search(&query).await.unwrap();
    assert!(results.is_empty());

    // No tenant at all: refused before any store call.
    let calls_before = p.store.query_calls();
    let result = p.retriever.search(&SearchQuery::new("kafka")).await;
    assert!(result.is_err());
    assert_eq!(p.store.query_calls(), calls_before);
}

#[tokio::test]
async fn test_degraded_results_still_serve_the_request() {
    let p = pipeline().await;
    index_corpus(&p).await;
    p.store.fail_dense(true);

    let mut query = SearchQuery::new("tokio worker thread").for_org("org-1");
    query.threshold = 0.0;
    query.rerank = false;

    let results = p.retriever.search(&query).await.unwrap();

    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.degraded));
    assert!(
        results
            .iter()
            .all(|r| r.degraded_reason.as_deref() == Some("dense_failed"))
    );
}

#[tokio::test]
async fn test_session_pipeline_end_to_end() {
    let p = pipeline().await;

    // Turns flow through the real indexer into the turns collection.
    let turn_indexer = DocumentIndexer::new(
        Arc::clone(&p.store) as Arc<dyn VectorStore>,
        Arc::clone(&p.registry),
        IndexerConfig {
            collection: "recall_turns".to_string(),
            ..IndexerConfig::default()
        },
    );
    turn_indexer
        .index_batch(vec![
            document("t1", "we compared docker compose and kubernetes", Some("sess-1")),
            document("t2", "kubernetes operators looked too heavy", Some("sess-1")),
        ])
        .await
        .unwrap();

    // Session summaries are written by another service; seed one directly.
    let summary_vector = p
        .registry
        .text()
        .await
        .unwrap()
        .embed("docker and kubernetes deployment discussion", true)
        .await
        .unwrap();
    p.store
        .upsert(
            "recall_sessions",
            vec![
                StorePoint::new("s1")
                    .with_dense("text_dense", summary_vector)
                    .with_payload_field("org_id", serde_json::json!("org-1"))
                    .with_payload_field("session_id", serde_json::json!("sess-1"))
                    .with_payload_field(
                        "summary",
                        serde_json::json!("docker and kubernetes deployment discussion"),
                    ),
            ],
        )
        .await
        .unwrap();

    let session_retriever = SessionAwareRetriever::new(
        Arc::clone(&p.store) as Arc<dyn VectorStore>,
        Arc::clone(&p.registry),
        Arc::clone(&p.router),
        SessionRetrieverConfig::default(),
    );

    let results = session_retriever
        .retrieve("docker and kubernetes deployment discussion", "org-1")
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    for result in &results {
        assert_eq!(result.session_id, "sess-1");
        assert_eq!(
            result.session_summary,
            "docker and kubernetes deployment discussion"
        );
        assert!(result.reranker_score.is_some());
    }
}

#[tokio::test]
async fn test_multi_query_pipeline_end_to_end() {
    let p = pipeline().await;
    index_corpus(&p).await;

    let llm = Arc::new(MockLlmClient::answering(
        r#"["tokio runtime threads", "worker thread tuning", "async runtime configuration"]"#,
    ));

    let multi = MultiQueryRetriever::new(
        Arc::clone(&p.retriever),
        Arc::clone(&p.router),
        llm,
        MultiQueryConfig::default(),
    );

    let mut query = SearchQuery::new("tokio worker configuration").for_org("org-1");
    query.threshold = 0.0;
    query.rerank = false;

    let results = multi.search(&query).await.unwrap();

    assert!(!results.is_empty());
    assert_eq!(results[0].id.to_string(), "tokio");
    assert!(results.iter().all(|r| r.rrf_score.is_some()));

    let usage = multi.usage();
    assert_eq!(usage.expansions, 1);
    assert!(usage.total_tokens > 0);
}

#[tokio::test]
async fn test_filters_flow_through_the_pipeline() {
    let p = pipeline().await;

    let mut tagged = document("tagged", "tagged memory entry about deployment", None);
    tagged
        .metadata
        .insert("type".to_string(), serde_json::json!("thought"));
    let mut other = document("other", "another memory entry about deployment", None);
    other
        .metadata
        .insert("type".to_string(), serde_json::json!("code"));

    p.indexer.index_batch(vec![tagged, other]).await.unwrap();

    let mut query = SearchQuery::new("memory entry deployment").for_org("org-1");
    query.threshold = 0.0;
    query.rerank = false;
    query.filters = Some(SearchFilters {
        type_tag: Some("thought".to_string()),
        ..SearchFilters::for_org("org-1")
    });

    let results = p.retriever.search(&query).await.unwrap();

    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.id.to_string() == "tagged"));
}

#[tokio::test]
async fn test_batch_queue_feeds_the_indexer() {
    let p = pipeline().await;

    let queue = BatchQueue::new(
        BatchConfig {
            batch_size: 2,
            flush_interval_ms: 60_000,
            max_queue_size: 10,
        },
        Arc::clone(&p.indexer) as Arc<dyn BatchSink>,
    );

    queue.add(document("q1", "first queued entry", None)).await.unwrap();
    queue.add(document("q2", "second queued entry", None)).await.unwrap();

    // Size threshold flushed synchronously into the store.
    assert_eq!(p.store.point_count("recall_memory"), Some(2));

    queue.add(document("q3", "third queued entry", None)).await.unwrap();
    queue.stop().await;
    assert_eq!(p.store.point_count("recall_memory"), Some(3));
}

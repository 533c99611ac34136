use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use tower::ServiceExt;

use crate::embedding::{
    ColbertConfig, DenseConfig, EmbedderRegistry, RegistryConfig, SparseConfig,
};
use crate::ratelimit::SlidingWindowRateLimiter;
use crate::rerankers::{RerankerRouter, RouterConfig, TierSet};
use crate::retrieval::{HybridRetriever, RetrieverConfig, SearchResponse};
use crate::store::{MockVectorStore, SparseVector, StorePoint, VectorStore};

use super::{AppState, router};

async fn test_app() -> (axum::Router, Arc<MockVectorStore>) {
    let store = Arc::new(MockVectorStore::new());
    let registry = Arc::new(EmbedderRegistry::new(RegistryConfig {
        text: DenseConfig::stub(32),
        code: DenseConfig::stub(32),
        sparse: SparseConfig::default(),
        colbert: ColbertConfig::stub(8),
    }));

    let colbert = registry.colbert().await.unwrap();
    let limiter = Arc::new(SlidingWindowRateLimiter::new(100, 1_000));
    let tiers = TierSet::from_config(&crate::config::Config::default(), colbert, None).unwrap();
    let router_component = Arc::new(RerankerRouter::new(tiers, limiter, RouterConfig::default()));

    let retriever = Arc::new(HybridRetriever::new(
        Arc::clone(&store) as Arc<dyn VectorStore>,
        Arc::clone(&registry),
        router_component,
        RetrieverConfig {
            min_score_dense: 0.0,
            min_score_sparse: 0.0,
            min_score_hybrid: 0.0,
            ..RetrieverConfig::default()
        },
    ));

    let state = AppState {
        retriever,
        store: Arc::clone(&store) as Arc<dyn VectorStore>,
        embedders: registry,
    };

    (router(state), store)
}

async fn post_search(app: axum::Router, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/search")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_search_happy_path() {
    let (app, store) = test_app().await;

    let sparse = crate::embedding::SparseEmbedder::default().embed_sparse("tokio runtime notes");
    store
        .upsert(
            "recall_memory",
            vec![
                StorePoint::new("m1")
                    .with_sparse("text_sparse", SparseVector::from_map(&sparse))
                    .with_payload_field("org_id", serde_json::json!("o1"))
                    .with_payload_field("content", serde_json::json!("tokio runtime notes")),
            ],
        )
        .await
        .unwrap();

    let (status, body) = post_search(
        app,
        serde_json::json!({
            "text": "\"tokio runtime\" notes",
            "limit": 5,
            "threshold": 0.0,
            "rerank": false,
            "filters": {"org_id": "o1"}
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);

    let response: SearchResponse = serde_json::from_value(body).unwrap();
    assert_eq!(response.total, response.results.len());
    assert_eq!(response.results[0].id.to_string(), "m1");
}

#[tokio::test]
async fn test_search_validation_rejects_bad_ranges() {
    let (app, _store) = test_app().await;

    let (status, _) = post_search(
        app.clone(),
        serde_json::json!({"text": "", "filters": {"org_id": "o1"}}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_search(
        app.clone(),
        serde_json::json!({"text": "q", "limit": 0, "filters": {"org_id": "o1"}}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_search(
        app.clone(),
        serde_json::json!({"text": "q", "limit": 500, "filters": {"org_id": "o1"}}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_search(
        app,
        serde_json::json!({"text": "q", "threshold": 1.5, "filters": {"org_id": "o1"}}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_without_tenant_is_typed_rejection() {
    let (app, store) = test_app().await;

    let (status, body) = post_search(app, serde_json::json!({"text": "query"})).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("org_id"));
    assert_eq!(store.query_calls(), 0);
}

#[tokio::test]
async fn test_search_total_failure_is_5xx() {
    let (app, store) = test_app().await;
    store.fail_dense(true);
    store.fail_sparse(true);

    let (status, _) = post_search(
        app,
        serde_json::json!({"text": "anything", "rerank": false, "filters": {"org_id": "o1"}}),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_healthz_reports_ok() {
    let (app, _store) = test_app().await;

    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
}

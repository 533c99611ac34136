use super::*;
use crate::store::mock::cosine_similarity;

fn point(id: &str, org: &str, dense: Vec<f32>) -> StorePoint {
    StorePoint::new(id)
        .with_dense("text_dense", dense)
        .with_payload_field("org_id", serde_json::json!(org))
        .with_payload_field("content", serde_json::json!(format!("content-{id}")))
}

#[test]
fn test_sparse_vector_from_map_sorts_indices() {
    let map: std::collections::HashMap<u32, f32> =
        [(9, 0.5), (1, 1.0), (4, 0.25)].into_iter().collect();

    let sparse = SparseVector::from_map(&map);
    assert_eq!(sparse.indices, vec![1, 4, 9]);
    assert_eq!(sparse.values, vec![1.0, 0.25, 0.5]);
}

#[test]
fn test_sparse_dot_product() {
    let a = SparseVector {
        indices: vec![1, 3, 7],
        values: vec![1.0, 2.0, 0.5],
    };
    let b = SparseVector {
        indices: vec![3, 7, 9],
        values: vec![0.5, 2.0, 1.0],
    };

    assert_eq!(a.dot(&b), 2.0 * 0.5 + 0.5 * 2.0);
    assert_eq!(a.dot(&SparseVector::default()), 0.0);
}

#[test]
fn test_cosine_similarity() {
    assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
}

#[tokio::test]
async fn test_mock_dense_query_filters_by_org() {
    let store = MockVectorStore::new();

    store
        .upsert(
            "memory",
            vec![
                point("a", "org-1", vec![1.0, 0.0]),
                point("b", "org-2", vec![1.0, 0.0]),
            ],
        )
        .await
        .unwrap();

    let hits = store
        .query_dense(
            "memory",
            "text_dense",
            vec![1.0, 0.0],
            &StoreFilter::for_org("org-1"),
            10,
        )
        .await
        .unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id.to_string(), "a");
    assert_eq!(store.dense_calls(), 1);
}

#[tokio::test]
async fn test_mock_filters_session_and_time_range() {
    let store = MockVectorStore::new();

    let mut in_range = point("in", "org-1", vec![1.0, 0.0]);
    in_range.payload.insert("session_id".into(), serde_json::json!("s1"));
    in_range.payload.insert("timestamp".into(), serde_json::json!(500));

    let mut out_of_range = point("out", "org-1", vec![1.0, 0.0]);
    out_of_range.payload.insert("session_id".into(), serde_json::json!("s1"));
    out_of_range.payload.insert("timestamp".into(), serde_json::json!(5_000));

    store
        .upsert("memory", vec![in_range, out_of_range])
        .await
        .unwrap();

    let filter = StoreFilter {
        org_id: "org-1".to_string(),
        session_id: Some("s1".to_string()),
        type_tag: None,
        time_range: Some((0, 1_000)),
        vt_end_after: None,
    };

    let hits = store
        .query_dense("memory", "text_dense", vec![1.0, 0.0], &filter, 10)
        .await
        .unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id.to_string(), "in");
}

#[tokio::test]
async fn test_mock_sparse_query_scores_by_dot_product() {
    let store = MockVectorStore::new();

    let mut strong = point("strong", "org-1", vec![0.0, 1.0]);
    strong.sparse = Some((
        "text_sparse".to_string(),
        SparseVector {
            indices: vec![1, 2],
            values: vec![2.0, 1.0],
        },
    ));

    let mut weak = point("weak", "org-1", vec![0.0, 1.0]);
    weak.sparse = Some((
        "text_sparse".to_string(),
        SparseVector {
            indices: vec![2],
            values: vec![0.5],
        },
    ));

    store.upsert("memory", vec![strong, weak]).await.unwrap();

    let query = SparseVector {
        indices: vec![1, 2],
        values: vec![1.0, 1.0],
    };

    let hits = store
        .query_sparse(
            "memory",
            "text_sparse",
            query,
            &StoreFilter::for_org("org-1"),
            10,
        )
        .await
        .unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id.to_string(), "strong");
    assert!(hits[0].score > hits[1].score);
}

#[tokio::test]
async fn test_mock_failure_injection() {
    let store = MockVectorStore::new();
    store.fail_dense(true);

    let result = store
        .query_dense(
            "memory",
            "text_dense",
            vec![1.0],
            &StoreFilter::for_org("org-1"),
            10,
        )
        .await;

    assert!(matches!(result, Err(StoreError::QueryFailed { .. })));
}

#[tokio::test]
async fn test_mock_collection_lifecycle() {
    let store = MockVectorStore::new();

    store
        .upsert("memory", vec![point("a", "org-1", vec![1.0])])
        .await
        .unwrap();

    assert_eq!(store.list_collections().await.unwrap(), vec!["memory"]);
    assert_eq!(store.collection_info("memory").await.unwrap().points_count, 1);
    assert!(store.delete_collection("memory").await.unwrap());
    assert!(!store.delete_collection("memory").await.unwrap());
    assert!(matches!(
        store.collection_info("memory").await,
        Err(StoreError::CollectionNotFound { .. })
    ));
}

use super::*;

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

#[tokio::test]
async fn test_stub_dense_embedding_is_deterministic_and_normalised() {
    let embedder = DenseEmbedder::new(DenseConfig::stub(384)).unwrap();

    let a = embedder.embed("the same input", false).await.unwrap();
    let b = embedder.embed("the same input", false).await.unwrap();
    let c = embedder.embed("a different input", false).await.unwrap();

    assert_eq!(a.len(), 384);
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert!((norm(&a) - 1.0).abs() < 1e-5);
}

#[tokio::test]
async fn test_dense_query_prefix_changes_query_side_only() {
    let config = DenseConfig {
        query_prefix: Some("query: ".to_string()),
        ..DenseConfig::stub(64)
    };
    let embedder = DenseEmbedder::new(config).unwrap();

    let as_query = embedder.embed("rust lifetimes", true).await.unwrap();
    let as_doc = embedder.embed("rust lifetimes", false).await.unwrap();

    assert_ne!(as_query, as_doc);
}

#[tokio::test]
async fn test_dense_batch_preserves_order() {
    let embedder = DenseEmbedder::new(DenseConfig::stub(32)).unwrap();

    let texts = vec!["one".to_string(), "two".to_string(), "three".to_string()];
    let batch = embedder.embed_batch(&texts, false).await.unwrap();

    assert_eq!(batch.len(), 3);
    for (text, vector) in texts.iter().zip(&batch) {
        assert_eq!(vector, &embedder.embed(text, false).await.unwrap());
    }
}

#[tokio::test]
async fn test_dense_load_is_idempotent() {
    let embedder = DenseEmbedder::new(DenseConfig::stub(16)).unwrap();

    assert!(!embedder.is_loaded().await);
    embedder.load().await.unwrap();
    embedder.load().await.unwrap();
    assert!(embedder.is_loaded().await);

    embedder.unload().await;
    assert!(!embedder.is_loaded().await);
}

#[test]
fn test_dense_config_rejects_zero_dimensions() {
    assert!(DenseEmbedder::new(DenseConfig::stub(0)).is_err());
}

#[test]
fn test_sparse_embedding_weights_and_stopwords() {
    let embedder = SparseEmbedder::new(SparseConfig::default());

    let sparse = embedder.embed_sparse("the rust borrow checker checker");

    // "the" is a stopword; "rust", "borrow", "checker" survive.
    assert_eq!(sparse.len(), 3);
    assert!(sparse.values().all(|w| *w > 0.0));

    // Repeated term gets a larger (but saturated) weight.
    let single = embedder.embed_sparse("checker");
    let single_weight = single.values().next().copied().unwrap();
    let repeated_weight = sparse
        .values()
        .fold(0.0f32, |max, w| max.max(*w));
    assert!(repeated_weight > single_weight * 0.9);
}

#[test]
fn test_sparse_embedding_is_deterministic() {
    let embedder = SparseEmbedder::new(SparseConfig::default());

    assert_eq!(
        embedder.embed_sparse("tokio spawn blocking"),
        embedder.embed_sparse("tokio spawn blocking")
    );
    assert!(embedder.embed_sparse("").is_empty());
    assert!(embedder.embed_sparse("a I").is_empty());
}

#[tokio::test]
async fn test_colbert_multi_vector_and_averaged_paths() {
    let embedder = ColbertEmbedder::new(ColbertConfig::stub(128)).unwrap();

    let tokens = embedder.embed_query("three word query").await.unwrap();
    assert_eq!(tokens.len(), 3);
    for token in &tokens {
        assert_eq!(token.len(), 128);
        assert!((norm(token) - 1.0).abs() < 1e-5);
    }

    let averaged = embedder.embed("three word query", true).await.unwrap();
    assert_eq!(averaged.len(), 128);
    assert!((norm(&averaged) - 1.0).abs() < 1e-5);

    // Same tokens in a different order average to the same vector.
    let reordered = embedder.embed("word query three", true).await.unwrap();
    for (a, b) in averaged.iter().zip(&reordered) {
        assert!((a - b).abs() < 1e-5);
    }
}

#[tokio::test]
async fn test_colbert_document_batch_preserves_order() {
    let embedder = ColbertEmbedder::new(ColbertConfig::stub(64)).unwrap();

    let docs = vec!["first doc".to_string(), "second".to_string()];
    let batches = embedder.embed_document_batch(&docs).await.unwrap();

    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].len(), 2);
    assert_eq!(batches[1].len(), 1);
}

#[tokio::test]
async fn test_registry_returns_singletons() {
    let registry = EmbedderRegistry::new(RegistryConfig::default());

    assert!(registry.is_empty().await);

    let a = registry.text().await.unwrap();
    let b = registry.text().await.unwrap();
    assert!(std::sync::Arc::ptr_eq(&a, &b));

    registry.sparse().await;
    registry.colbert().await.unwrap();
    assert_eq!(registry.len().await, 3);
}

#[tokio::test]
async fn test_registry_preload_and_unload() {
    let registry = EmbedderRegistry::new(RegistryConfig::default());

    registry.preload_all().await;
    assert_eq!(registry.len().await, 4);

    let text = registry.text().await.unwrap();
    assert!(text.is_loaded().await);

    registry.unload_all().await;
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn test_registry_preload_removes_failed_entry() {
    let config = RegistryConfig {
        text: DenseConfig {
            model_path: Some(std::path::PathBuf::from("/nonexistent/model-dir")),
            ..DenseConfig::stub(384)
        },
        ..RegistryConfig::default()
    };
    let registry = EmbedderRegistry::new(config);

    registry.preload_all().await;

    // Text failed to load and was removed; the others survive.
    assert_eq!(registry.len().await, 3);
}

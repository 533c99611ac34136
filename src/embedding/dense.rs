//! Dense text/code embedder.
//!
//! One type serves both the conversational-text and code capability classes;
//! construction parameters (model directory, dimension, query prefix) pick
//! the class. Without a model directory the embedder runs in stub mode:
//! deterministic hash-seeded vectors, suitable for tests and development.

use std::path::PathBuf;
use std::sync::Arc;

use moka::sync::Cache;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::bert::{BertEncoder, normalize};
use super::device::select_device;
use super::error::EmbeddingError;

/// Construction parameters for a dense embedder.
#[derive(Debug, Clone)]
pub struct DenseConfig {
    /// Model directory; stub mode when unset.
    pub model_path: Option<PathBuf>,
    /// Output embedding dimension.
    pub dimensions: usize,
    /// Prefix prepended to query-side inputs (instruction-tuned models).
    pub query_prefix: Option<String>,
    /// Maximum input sequence length.
    pub max_seq_len: usize,
    /// LRU cache capacity for computed embeddings.
    pub cache_size: u64,
}

impl DenseConfig {
    /// Stub-mode config with the given dimension.
    pub fn stub(dimensions: usize) -> Self {
        Self {
            model_path: None,
            dimensions,
            query_prefix: None,
            max_seq_len: 512,
            cache_size: 10_000,
        }
    }

    fn validate(&self) -> Result<(), EmbeddingError> {
        if self.dimensions == 0 {
            return Err(EmbeddingError::InvalidConfig {
                reason: "dimensions must be positive".to_string(),
            });
        }
        Ok(())
    }
}

enum DenseBackend {
    Model(Arc<BertEncoder>),
    Stub,
}

/// Dense embedder with lazy loading and an embedding LRU.
pub struct DenseEmbedder {
    config: DenseConfig,
    backend: RwLock<Option<DenseBackend>>,
    cache: Cache<u64, Vec<f32>>,
}

impl DenseEmbedder {
    /// Creates the embedder without loading any model; `load` runs on first
    /// use or during registry preload.
    pub fn new(config: DenseConfig) -> Result<Self, EmbeddingError> {
        config.validate()?;

        let cache = Cache::new(config.cache_size);

        Ok(Self {
            config,
            backend: RwLock::new(None),
            cache,
        })
    }

    /// Output embedding dimension.
    pub fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    /// Returns `true` once `load` has completed.
    pub async fn is_loaded(&self) -> bool {
        self.backend.read().await.is_some()
    }

    /// Loads the model (idempotent; safe under concurrent first calls).
    ///
    /// Model inference setup runs on the blocking pool since safetensors
    /// mapping and weight initialisation are CPU/disk bound.
    pub async fn load(&self) -> Result<(), EmbeddingError> {
        if self.backend.read().await.is_some() {
            debug!("dense embedder already loaded");
            return Ok(());
        }

        let mut slot = self.backend.write().await;
        if slot.is_some() {
            return Ok(());
        }

        let backend = match self.config.model_path.clone() {
            Some(model_dir) => {
                info!(model_dir = %model_dir.display(), dim = self.config.dimensions, "Loading dense embedding model");
                let max_len = self.config.max_seq_len;
                let encoder = tokio::task::spawn_blocking(move || {
                    BertEncoder::load(&model_dir, select_device(), max_len)
                })
                .await
                .map_err(|e| EmbeddingError::ModelLoadFailed {
                    reason: format!("load task failed: {e}"),
                })??;

                DenseBackend::Model(Arc::new(encoder))
            }
            None => {
                warn!(dim = self.config.dimensions, "Dense embedder running in STUB mode");
                DenseBackend::Stub
            }
        };

        *slot = Some(backend);
        Ok(())
    }

    /// Unloads the model and clears the cache (idempotent).
    pub async fn unload(&self) {
        *self.backend.write().await = None;
        self.cache.invalidate_all();
    }

    /// Embeds one text; `is_query` applies the configured query prefix.
    pub async fn embed(&self, text: &str, is_query: bool) -> Result<Vec<f32>, EmbeddingError> {
        self.load().await?;

        let input = self.apply_prefix(text, is_query);
        let key = cache_key(&input);

        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let embedding = {
            let backend = self.backend.read().await;
            match backend.as_ref() {
                Some(DenseBackend::Model(encoder)) => {
                    let encoder = Arc::clone(encoder);
                    let dim = self.config.dimensions;
                    let owned = input.clone();
                    tokio::task::spawn_blocking(move || encoder.embed_pooled(&owned, dim))
                        .await
                        .map_err(|e| EmbeddingError::InferenceFailed {
                            reason: format!("inference task failed: {e}"),
                        })??
                }
                Some(DenseBackend::Stub) => stub_embedding(&input, self.config.dimensions),
                None => unreachable!("load() populated the backend"),
            }
        };

        self.cache.insert(key, embedding.clone());
        Ok(embedding)
    }

    /// Embeds a batch, preserving order.
    pub async fn embed_batch(
        &self,
        texts: &[String],
        is_query: bool,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text, is_query).await?);
        }
        Ok(embeddings)
    }

    fn apply_prefix(&self, text: &str, is_query: bool) -> String {
        match (&self.config.query_prefix, is_query) {
            (Some(prefix), true) => format!("{prefix}{text}"),
            _ => text.to_string(),
        }
    }
}

impl std::fmt::Debug for DenseEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DenseEmbedder")
            .field("dimensions", &self.config.dimensions)
            .field("model_path", &self.config.model_path)
            .finish()
    }
}

fn cache_key(input: &str) -> u64 {
    let hash = blake3::hash(input.as_bytes());
    u64::from_le_bytes(hash.as_bytes()[..8].try_into().unwrap_or_default())
}

/// Deterministic pseudo-embedding seeded by the input hash; L2-normalised so
/// cosine comparisons behave like model output.
pub(crate) fn stub_embedding(text: &str, dimensions: usize) -> Vec<f32> {
    let hash = blake3::hash(text.as_bytes());
    let seed = u64::from_le_bytes(hash.as_bytes()[..8].try_into().unwrap_or_default());

    let mut embedding = Vec::with_capacity(dimensions);
    let mut state = seed;

    for _ in 0..dimensions {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let value = ((state >> 32) as f32 / u32::MAX as f32) * 2.0 - 1.0;
        embedding.push(value);
    }

    normalize(&mut embedding);
    embedding
}

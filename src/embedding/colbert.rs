//! Late-interaction (ColBERT) embedder.
//!
//! Produces one vector per token; ranking uses MaxSim across tokens. The
//! embedder keeps two contracts:
//!
//! - [`ColbertEmbedder::embed_query`] / [`ColbertEmbedder::embed_document`]
//!   return the true multi-vector output, consumed by the indexer and the
//!   colbert reranking tier;
//! - [`ColbertEmbedder::embed`] averages the token vectors into a single
//!   normalised vector so the embedder also satisfies the registry's uniform
//!   dense surface. Callers that can use the multi-vector path should.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::bert::{BertEncoder, normalize};
use super::dense::stub_embedding;
use super::device::select_device;
use super::error::EmbeddingError;

/// Construction parameters for the ColBERT embedder.
#[derive(Debug, Clone)]
pub struct ColbertConfig {
    /// Model directory; stub mode when unset.
    pub model_path: Option<PathBuf>,
    /// Per-token vector dimension.
    pub dimensions: usize,
    /// Maximum input sequence length.
    pub max_seq_len: usize,
}

impl ColbertConfig {
    /// Stub-mode config with the given per-token dimension.
    pub fn stub(dimensions: usize) -> Self {
        Self {
            model_path: None,
            dimensions,
            max_seq_len: 512,
        }
    }
}

enum ColbertBackend {
    Model(Arc<BertEncoder>),
    Stub,
}

/// Multi-vector embedder with lazy loading.
pub struct ColbertEmbedder {
    config: ColbertConfig,
    backend: RwLock<Option<ColbertBackend>>,
}

impl ColbertEmbedder {
    /// Creates the embedder without loading any model.
    pub fn new(config: ColbertConfig) -> Result<Self, EmbeddingError> {
        if config.dimensions == 0 {
            return Err(EmbeddingError::InvalidConfig {
                reason: "dimensions must be positive".to_string(),
            });
        }

        Ok(Self {
            config,
            backend: RwLock::new(None),
        })
    }

    /// Per-token vector dimension.
    pub fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    /// Loads the model (idempotent; safe under concurrent first calls).
    pub async fn load(&self) -> Result<(), EmbeddingError> {
        if self.backend.read().await.is_some() {
            debug!("colbert embedder already loaded");
            return Ok(());
        }

        let mut slot = self.backend.write().await;
        if slot.is_some() {
            return Ok(());
        }

        let backend = match self.config.model_path.clone() {
            Some(model_dir) => {
                info!(model_dir = %model_dir.display(), dim = self.config.dimensions, "Loading ColBERT model");
                let max_len = self.config.max_seq_len;
                let encoder = tokio::task::spawn_blocking(move || {
                    BertEncoder::load(&model_dir, select_device(), max_len)
                })
                .await
                .map_err(|e| EmbeddingError::ModelLoadFailed {
                    reason: format!("load task failed: {e}"),
                })??;

                ColbertBackend::Model(Arc::new(encoder))
            }
            None => {
                warn!(dim = self.config.dimensions, "ColBERT embedder running in STUB mode");
                ColbertBackend::Stub
            }
        };

        *slot = Some(backend);
        Ok(())
    }

    /// Unloads the model (idempotent).
    pub async fn unload(&self) {
        *self.backend.write().await = None;
    }

    /// Token-level embedding of a query.
    pub async fn embed_query(&self, query: &str) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.embed_tokens(query).await
    }

    /// Token-level embedding of a document.
    pub async fn embed_document(&self, document: &str) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.embed_tokens(document).await
    }

    /// Batch token-level embedding of documents, preserving order.
    pub async fn embed_document_batch(
        &self,
        documents: &[String],
    ) -> Result<Vec<Vec<Vec<f32>>>, EmbeddingError> {
        let mut batches = Vec::with_capacity(documents.len());
        for document in documents {
            batches.push(self.embed_tokens(document).await?);
        }
        Ok(batches)
    }

    /// Averaged single-vector embedding, for the uniform dense surface.
    pub async fn embed(&self, text: &str, _is_query: bool) -> Result<Vec<f32>, EmbeddingError> {
        let tokens = self.embed_tokens(text).await?;
        if tokens.is_empty() {
            return Ok(vec![0.0; self.config.dimensions]);
        }

        let mut averaged = vec![0.0f32; self.config.dimensions];
        for token in &tokens {
            for (acc, value) in averaged.iter_mut().zip(token) {
                *acc += value;
            }
        }
        let count = tokens.len() as f32;
        for value in &mut averaged {
            *value /= count;
        }

        normalize(&mut averaged);
        Ok(averaged)
    }

    async fn embed_tokens(&self, text: &str) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.load().await?;

        let backend = self.backend.read().await;
        match backend.as_ref() {
            Some(ColbertBackend::Model(encoder)) => {
                let encoder = Arc::clone(encoder);
                let dim = self.config.dimensions;
                let owned = text.to_string();
                tokio::task::spawn_blocking(move || encoder.embed_tokens(&owned, dim))
                    .await
                    .map_err(|e| EmbeddingError::InferenceFailed {
                        reason: format!("inference task failed: {e}"),
                    })?
            }
            Some(ColbertBackend::Stub) => Ok(stub_token_embeddings(text, self.config.dimensions)),
            None => unreachable!("load() populated the backend"),
        }
    }
}

impl std::fmt::Debug for ColbertEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColbertEmbedder")
            .field("dimensions", &self.config.dimensions)
            .field("model_path", &self.config.model_path)
            .finish()
    }
}

/// One deterministic vector per whitespace token, seeded by the token text.
fn stub_token_embeddings(text: &str, dimensions: usize) -> Vec<Vec<f32>> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return vec![stub_embedding(text, dimensions)];
    }

    tokens
        .iter()
        .map(|token| stub_embedding(token, dimensions))
        .collect()
}

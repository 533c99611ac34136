//! Lazy, singleton embedder registry.
//!
//! One instance per capability class, constructed on first request under a
//! per-capability lock so concurrent first calls build exactly one embedder.
//! Preloading warms every model; an individual failure removes that entry
//! without affecting the others.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info};

use crate::config::Config;
use crate::constants::{CODE_EMBEDDING_DIM, COLBERT_EMBEDDING_DIM, TEXT_EMBEDDING_DIM};

use super::colbert::{ColbertConfig, ColbertEmbedder};
use super::dense::{DenseConfig, DenseEmbedder};
use super::error::EmbeddingError;
use super::sparse::{SparseConfig, SparseEmbedder};

/// Construction parameters for every capability class.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Dense text embedder parameters.
    pub text: DenseConfig,
    /// Dense code embedder parameters.
    pub code: DenseConfig,
    /// Sparse embedder parameters.
    pub sparse: SparseConfig,
    /// ColBERT embedder parameters.
    pub colbert: ColbertConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            text: DenseConfig {
                query_prefix: Some(
                    "Represent this sentence for searching relevant passages: ".to_string(),
                ),
                ..DenseConfig::stub(TEXT_EMBEDDING_DIM)
            },
            code: DenseConfig::stub(CODE_EMBEDDING_DIM),
            sparse: SparseConfig::default(),
            colbert: ColbertConfig::stub(COLBERT_EMBEDDING_DIM),
        }
    }
}

impl RegistryConfig {
    /// Builds registry parameters from the service configuration.
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();

        Self {
            text: DenseConfig {
                model_path: config.text_model_path.clone(),
                ..defaults.text
            },
            code: DenseConfig {
                model_path: config.code_model_path.clone(),
                ..defaults.code
            },
            sparse: defaults.sparse,
            colbert: ColbertConfig {
                model_path: config.colbert_model_path.clone(),
                ..defaults.colbert
            },
        }
    }
}

/// Registry handing out shared embedder instances per capability class.
pub struct EmbedderRegistry {
    config: RegistryConfig,
    text: Mutex<Option<Arc<DenseEmbedder>>>,
    code: Mutex<Option<Arc<DenseEmbedder>>>,
    sparse: Mutex<Option<Arc<SparseEmbedder>>>,
    colbert: Mutex<Option<Arc<ColbertEmbedder>>>,
}

impl EmbedderRegistry {
    /// Creates an empty registry; embedders are built on first request.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            text: Mutex::new(None),
            code: Mutex::new(None),
            sparse: Mutex::new(None),
            colbert: Mutex::new(None),
        }
    }

    /// Returns the dense text embedder, building it on first call.
    pub async fn text(&self) -> Result<Arc<DenseEmbedder>, EmbeddingError> {
        let mut slot = self.text.lock().await;
        if let Some(ref embedder) = *slot {
            return Ok(Arc::clone(embedder));
        }

        info!("Creating dense text embedder");
        let embedder = Arc::new(DenseEmbedder::new(self.config.text.clone())?);
        *slot = Some(Arc::clone(&embedder));
        Ok(embedder)
    }

    /// Returns the dense code embedder, building it on first call.
    pub async fn code(&self) -> Result<Arc<DenseEmbedder>, EmbeddingError> {
        let mut slot = self.code.lock().await;
        if let Some(ref embedder) = *slot {
            return Ok(Arc::clone(embedder));
        }

        info!("Creating dense code embedder");
        let embedder = Arc::new(DenseEmbedder::new(self.config.code.clone())?);
        *slot = Some(Arc::clone(&embedder));
        Ok(embedder)
    }

    /// Returns the sparse embedder, building it on first call.
    pub async fn sparse(&self) -> Arc<SparseEmbedder> {
        let mut slot = self.sparse.lock().await;
        if let Some(ref embedder) = *slot {
            return Arc::clone(embedder);
        }

        info!("Creating sparse embedder");
        let embedder = Arc::new(SparseEmbedder::new(self.config.sparse.clone()));
        *slot = Some(Arc::clone(&embedder));
        embedder
    }

    /// Returns the ColBERT embedder, building it on first call.
    pub async fn colbert(&self) -> Result<Arc<ColbertEmbedder>, EmbeddingError> {
        let mut slot = self.colbert.lock().await;
        if let Some(ref embedder) = *slot {
            return Ok(Arc::clone(embedder));
        }

        info!("Creating ColBERT embedder");
        let embedder = Arc::new(ColbertEmbedder::new(self.config.colbert.clone())?);
        *slot = Some(Arc::clone(&embedder));
        Ok(embedder)
    }

    /// Warms every embedder. An individual load failure is logged and that
    /// entry removed; the others keep working.
    pub async fn preload_all(&self) {
        info!("Preloading embedder models");

        match self.text().await {
            Ok(embedder) => {
                if let Err(e) = embedder.load().await {
                    error!(error = %e, "Failed to preload text embedder, removing entry");
                    *self.text.lock().await = None;
                }
            }
            Err(e) => error!(error = %e, "Failed to create text embedder"),
        }

        match self.code().await {
            Ok(embedder) => {
                if let Err(e) = embedder.load().await {
                    error!(error = %e, "Failed to preload code embedder, removing entry");
                    *self.code.lock().await = None;
                }
            }
            Err(e) => error!(error = %e, "Failed to create code embedder"),
        }

        if let Err(e) = self.sparse().await.load().await {
            error!(error = %e, "Failed to preload sparse embedder, removing entry");
            *self.sparse.lock().await = None;
        }

        match self.colbert().await {
            Ok(embedder) => {
                if let Err(e) = embedder.load().await {
                    error!(error = %e, "Failed to preload ColBERT embedder, removing entry");
                    *self.colbert.lock().await = None;
                }
            }
            Err(e) => error!(error = %e, "Failed to create ColBERT embedder"),
        }

        info!(count = self.len().await, "Embedder preload complete");
    }

    /// Unloads every embedder and clears the registry.
    pub async fn unload_all(&self) {
        if let Some(embedder) = self.text.lock().await.take() {
            embedder.unload().await;
        }
        if let Some(embedder) = self.code.lock().await.take() {
            embedder.unload().await;
        }
        self.sparse.lock().await.take();
        if let Some(embedder) = self.colbert.lock().await.take() {
            embedder.unload().await;
        }

        info!("All embedders unloaded");
    }

    /// Number of constructed embedders.
    pub async fn len(&self) -> usize {
        let mut count = 0;
        if self.text.lock().await.is_some() {
            count += 1;
        }
        if self.code.lock().await.is_some() {
            count += 1;
        }
        if self.sparse.lock().await.is_some() {
            count += 1;
        }
        if self.colbert.lock().await.is_some() {
            count += 1;
        }
        count
    }

    /// Returns `true` when no embedder has been constructed yet.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

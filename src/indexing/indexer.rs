//! Multi-vector document indexer.
//!
//! Turns a batch of documents into store points carrying a dense vector, a
//! sparse vector, and (when enabled) a late-interaction multi-vector, then
//! upserts the whole batch in one store call. A typed error distinguishes a
//! rejected batch from an empty one, so the consumer can decide whether to
//! acknowledge.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::constants::{COLBERT_FIELD, SPARSE_FIELD, TEXT_DENSE_FIELD};
use crate::embedding::{EmbedderRegistry, EmbeddingError};
use crate::store::{SparseVector, StoreError, StorePoint, VectorStore};

use super::batch::{BatchSink, Document};

/// Indexer tuning.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Target collection.
    pub collection: String,
    /// Named dense vector to write.
    pub dense_field: String,
    /// Named sparse vector to write.
    pub sparse_field: String,
    /// Named multi-vector to write when enabled.
    pub colbert_field: String,
    /// Generate late-interaction vectors. When off, points carry no
    /// multi-vector field at all; the collection schema differs.
    pub enable_colbert: bool,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            collection: "recall_memory".to_string(),
            dense_field: TEXT_DENSE_FIELD.to_string(),
            sparse_field: SPARSE_FIELD.to_string(),
            colbert_field: COLBERT_FIELD.to_string(),
            enable_colbert: true,
        }
    }
}

#[derive(Debug, Error)]
/// Batch indexing failure. The batch was not written; the event stream is
/// expected to redeliver it.
pub enum IndexError {
    /// A document arrived without a tenant id.
    #[error("document '{document_id}' has no org_id")]
    TenantMissing {
        /// Offending document.
        document_id: String,
    },

    /// Embedding generation failed.
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    /// The store rejected the batch.
    #[error("store upsert failed: {0}")]
    Store(#[from] StoreError),
}

/// Batch indexer over the store and embedder registry.
pub struct DocumentIndexer {
    store: Arc<dyn VectorStore>,
    embedders: Arc<EmbedderRegistry>,
    config: IndexerConfig,
}

impl DocumentIndexer {
    /// Creates the indexer.
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedders: Arc<EmbedderRegistry>,
        config: IndexerConfig,
    ) -> Self {
        Self {
            store,
            embedders,
            config,
        }
    }

    /// Indexes one batch; returns the number of documents written.
    ///
    /// All embeddings for the batch are generated in one call per capability
    /// class, and the store sees exactly one upsert.
    pub async fn index_batch(&self, documents: Vec<Document>) -> Result<usize, IndexError> {
        if documents.is_empty() {
            return Ok(0);
        }

        for document in &documents {
            if document.org_id.is_empty() {
                return Err(IndexError::TenantMissing {
                    document_id: document.id.clone(),
                });
            }
        }

        info!(size = documents.len(), collection = %self.config.collection, "indexing batch");

        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();

        debug!("generating dense embeddings");
        let text_embedder = self
            .embedders
            .text()
            .await
            .map_err(IndexError::Embedding)?;
        let dense = text_embedder.embed_batch(&texts, false).await?;

        debug!("generating sparse embeddings");
        let sparse_embedder = self.embedders.sparse().await;
        let sparse = sparse_embedder.embed_sparse_batch(&texts);

        let colbert = if self.config.enable_colbert {
            debug!("generating late-interaction embeddings");
            let colbert_embedder = self
                .embedders
                .colbert()
                .await
                .map_err(IndexError::Embedding)?;
            Some(colbert_embedder.embed_document_batch(&texts).await?)
        } else {
            None
        };

        let points: Vec<StorePoint> = documents
            .into_iter()
            .enumerate()
            .map(|(i, document)| {
                self.build_point(
                    document,
                    dense[i].clone(),
                    &sparse[i],
                    colbert.as_ref().map(|c| c[i].clone()),
                )
            })
            .collect();

        let count = points.len();
        self.store.upsert(&self.config.collection, points).await?;

        info!(count, "batch indexed");
        Ok(count)
    }

    /// Indexes one document; `true` on success.
    pub async fn index_single(&self, document: Document) -> Result<bool, IndexError> {
        Ok(self.index_batch(vec![document]).await? == 1)
    }

    fn build_point(
        &self,
        document: Document,
        dense: Vec<f32>,
        sparse: &std::collections::HashMap<u32, f32>,
        colbert: Option<Vec<Vec<f32>>>,
    ) -> StorePoint {
        let mut point = StorePoint::new(document.id)
            .with_dense(&self.config.dense_field, dense)
            .with_sparse(&self.config.sparse_field, SparseVector::from_map(sparse))
            .with_payload_field("content", serde_json::json!(document.content))
            .with_payload_field("org_id", serde_json::json!(document.org_id));

        if let Some(vectors) = colbert {
            point = point.with_multi(&self.config.colbert_field, vectors);
        }

        for (key, value) in document.metadata {
            point.payload.insert(key, value);
        }

        if let Some(session_id) = document.session_id {
            point
                .payload
                .insert("session_id".to_string(), serde_json::json!(session_id));
        }

        point
    }
}

#[async_trait]
impl BatchSink for DocumentIndexer {
    async fn flush(&self, batch: Vec<Document>) -> Result<usize, IndexError> {
        self.index_batch(batch).await
    }
}

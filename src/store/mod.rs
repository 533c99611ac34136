//! Vector store seam.
//!
//! The pipeline talks to the store through [`VectorStore`]: named dense
//! vectors, one sparse vector, optional multi-vectors, payload filters.
//! [`QdrantStore`] is the production implementation; tests use
//! [`MockVectorStore`].

pub mod error;
pub mod model;
pub mod qdrant;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(test)]
mod tests;

pub use error::StoreError;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockVectorStore;
pub use model::{CollectionInfo, PointId, SparseVector, StoreFilter, StoreHit, StorePoint};
pub use qdrant::QdrantStore;

use async_trait::async_trait;

/// Capabilities the retrieval and indexing pipelines require from a vector
/// store.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Searches one named dense vector, filtered by payload fields.
    async fn query_dense(
        &self,
        collection: &str,
        vector_name: &str,
        vector: Vec<f32>,
        filter: &StoreFilter,
        limit: usize,
    ) -> Result<Vec<StoreHit>, StoreError>;

    /// Searches the named sparse vector, filtered by payload fields.
    async fn query_sparse(
        &self,
        collection: &str,
        vector_name: &str,
        vector: SparseVector,
        filter: &StoreFilter,
        limit: usize,
    ) -> Result<Vec<StoreHit>, StoreError>;

    /// Upserts a batch of points in one call.
    async fn upsert(&self, collection: &str, points: Vec<StorePoint>) -> Result<(), StoreError>;

    /// Reads collection metadata.
    async fn collection_info(&self, collection: &str) -> Result<CollectionInfo, StoreError>;

    /// Lists collection names.
    async fn list_collections(&self) -> Result<Vec<String>, StoreError>;

    /// Deletes a collection; returns `false` when it did not exist.
    async fn delete_collection(&self, collection: &str) -> Result<bool, StoreError>;

    /// Verifies the store is reachable.
    async fn health_check(&self) -> Result<(), StoreError>;
}

//! In-memory [`VectorStore`] for tests and examples.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use super::error::StoreError;
use super::model::{CollectionInfo, PointId, SparseVector, StoreFilter, StoreHit, StorePoint};
use super::VectorStore;

#[derive(Default)]
struct MockCollection {
    points: HashMap<String, StorePoint>,
}

/// Deterministic in-memory store: cosine similarity on dense vectors, dot
/// product on sparse vectors, exact payload filter semantics, and failure
/// injection for degradation tests.
#[derive(Default)]
pub struct MockVectorStore {
    collections: RwLock<HashMap<String, MockCollection>>,
    fail_collections: RwLock<std::collections::HashSet<String>>,
    fail_dense: AtomicBool,
    fail_sparse: AtomicBool,
    fail_upsert: AtomicBool,
    dense_calls: AtomicUsize,
    sparse_calls: AtomicUsize,
    upsert_calls: AtomicUsize,
}

impl MockVectorStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every dense query fail until cleared.
    pub fn fail_dense(&self, fail: bool) {
        self.fail_dense.store(fail, Ordering::SeqCst);
    }

    /// Makes every sparse query fail until cleared.
    pub fn fail_sparse(&self, fail: bool) {
        self.fail_sparse.store(fail, Ordering::SeqCst);
    }

    /// Makes every upsert fail until cleared.
    pub fn fail_upsert(&self, fail: bool) {
        self.fail_upsert.store(fail, Ordering::SeqCst);
    }

    /// Makes every query against one collection fail until cleared.
    pub fn fail_collection(&self, collection: &str, fail: bool) {
        let mut failing = self.fail_collections.write().unwrap_or_else(|e| e.into_inner());
        if fail {
            failing.insert(collection.to_string());
        } else {
            failing.remove(collection);
        }
    }

    fn collection_failing(&self, collection: &str) -> bool {
        self.fail_collections
            .read()
            .map(|set| set.contains(collection))
            .unwrap_or(false)
    }

    /// Number of dense queries issued.
    pub fn dense_calls(&self) -> usize {
        self.dense_calls.load(Ordering::SeqCst)
    }

    /// Number of sparse queries issued.
    pub fn sparse_calls(&self) -> usize {
        self.sparse_calls.load(Ordering::SeqCst)
    }

    /// Number of upsert calls issued.
    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    /// Total store queries issued (dense + sparse).
    pub fn query_calls(&self) -> usize {
        self.dense_calls() + self.sparse_calls()
    }

    /// Number of points in a collection, if it exists.
    pub fn point_count(&self, collection: &str) -> Option<usize> {
        self.collections
            .read()
            .ok()?
            .get(collection)
            .map(|c| c.points.len())
    }

    /// Returns a stored point by id.
    pub fn get_point(&self, collection: &str, id: &str) -> Option<StorePoint> {
        self.collections
            .read()
            .ok()?
            .get(collection)
            .and_then(|c| c.points.get(id).cloned())
    }

    fn matches(filter: &StoreFilter, payload: &serde_json::Map<String, serde_json::Value>) -> bool {
        if payload.get("org_id").and_then(|v| v.as_str()) != Some(filter.org_id.as_str()) {
            return false;
        }

        if let Some(ref session_id) = filter.session_id
            && payload.get("session_id").and_then(|v| v.as_str()) != Some(session_id.as_str())
        {
            return false;
        }

        if let Some(ref type_tag) = filter.type_tag
            && payload.get("type").and_then(|v| v.as_str()) != Some(type_tag.as_str())
        {
            return false;
        }

        if let Some((start_ms, end_ms)) = filter.time_range {
            let ts = payload.get("timestamp").and_then(|v| v.as_i64());
            match ts {
                Some(ts) if ts >= start_ms && ts <= end_ms => {}
                _ => return false,
            }
        }

        if let Some(vt_end_after) = filter.vt_end_after {
            let vt_end = payload.get("vt_end").and_then(|v| v.as_i64());
            match vt_end {
                Some(vt_end) if vt_end > vt_end_after => {}
                _ => return false,
            }
        }

        true
    }

    fn to_hit(id: &str, score: f32, point: &StorePoint) -> StoreHit {
        let id = match id.parse::<u64>() {
            Ok(n) => PointId::Num(n),
            Err(_) => PointId::Uuid(id.to_string()),
        };

        StoreHit {
            id,
            score,
            payload: point.payload.clone(),
        }
    }
}

/// Cosine similarity between two vectors (0.0 when either norm is zero).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for MockVectorStore {
    async fn query_dense(
        &self,
        collection: &str,
        vector_name: &str,
        vector: Vec<f32>,
        filter: &StoreFilter,
        limit: usize,
    ) -> Result<Vec<StoreHit>, StoreError> {
        self.dense_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_dense.load(Ordering::SeqCst) || self.collection_failing(collection) {
            return Err(StoreError::QueryFailed {
                collection: collection.to_string(),
                message: "injected dense failure".to_string(),
            });
        }

        let collections = self.collections.read().map_err(|_| StoreError::QueryFailed {
            collection: collection.to_string(),
            message: "lock poisoned".to_string(),
        })?;

        let coll = match collections.get(collection) {
            Some(coll) => coll,
            None => return Ok(vec![]),
        };

        let mut hits: Vec<StoreHit> = coll
            .points
            .iter()
            .filter(|(_, p)| Self::matches(filter, &p.payload))
            .filter_map(|(id, p)| {
                p.dense
                    .get(vector_name)
                    .map(|stored| Self::to_hit(id, cosine_similarity(stored, &vector), p))
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn query_sparse(
        &self,
        collection: &str,
        vector_name: &str,
        vector: SparseVector,
        filter: &StoreFilter,
        limit: usize,
    ) -> Result<Vec<StoreHit>, StoreError> {
        self.sparse_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_sparse.load(Ordering::SeqCst) || self.collection_failing(collection) {
            return Err(StoreError::QueryFailed {
                collection: collection.to_string(),
                message: "injected sparse failure".to_string(),
            });
        }

        let collections = self.collections.read().map_err(|_| StoreError::QueryFailed {
            collection: collection.to_string(),
            message: "lock poisoned".to_string(),
        })?;

        let coll = match collections.get(collection) {
            Some(coll) => coll,
            None => return Ok(vec![]),
        };

        let mut hits: Vec<StoreHit> = coll
            .points
            .iter()
            .filter(|(_, p)| Self::matches(filter, &p.payload))
            .filter_map(|(id, p)| match &p.sparse {
                Some((name, stored)) if name == vector_name => {
                    let score = stored.dot(&vector);
                    (score > 0.0).then(|| Self::to_hit(id, score, p))
                }
                _ => None,
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn upsert(&self, collection: &str, points: Vec<StorePoint>) -> Result<(), StoreError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(StoreError::UpsertFailed {
                collection: collection.to_string(),
                message: "injected upsert failure".to_string(),
            });
        }

        let mut collections = self
            .collections
            .write()
            .map_err(|_| StoreError::UpsertFailed {
                collection: collection.to_string(),
                message: "lock poisoned".to_string(),
            })?;

        let coll = collections.entry(collection.to_string()).or_default();

        for point in points {
            coll.points.insert(point.id.clone(), point);
        }

        Ok(())
    }

    async fn collection_info(&self, collection: &str) -> Result<CollectionInfo, StoreError> {
        let collections = self.collections.read().map_err(|_| StoreError::QueryFailed {
            collection: collection.to_string(),
            message: "lock poisoned".to_string(),
        })?;

        let coll = collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound {
                collection: collection.to_string(),
            })?;

        Ok(CollectionInfo {
            points_count: coll.points.len() as u64,
        })
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let collections = self.collections.read().map_err(|_| StoreError::ConnectionFailed {
            url: "mock".to_string(),
            message: "lock poisoned".to_string(),
        })?;

        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete_collection(&self, collection: &str) -> Result<bool, StoreError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| StoreError::DeleteFailed {
                collection: collection.to_string(),
                message: "lock poisoned".to_string(),
            })?;

        Ok(collections.remove(collection).is_some())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

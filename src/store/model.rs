use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Point identifier as the store reports it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointId {
    /// Numeric point id.
    Num(u64),
    /// UUID / ULID point id.
    Uuid(String),
}

impl std::fmt::Display for PointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PointId::Num(n) => write!(f, "{n}"),
            PointId::Uuid(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for PointId {
    fn from(s: &str) -> Self {
        PointId::Uuid(s.to_string())
    }
}

impl From<u64> for PointId {
    fn from(n: u64) -> Self {
        PointId::Num(n)
    }
}

/// Sparse vector: parallel index/weight arrays, as stores expect them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    /// Vocabulary indices.
    pub indices: Vec<u32>,
    /// Positive weights, parallel to `indices`.
    pub values: Vec<f32>,
}

impl SparseVector {
    /// Builds a sparse vector from an index -> weight map.
    pub fn from_map(map: &HashMap<u32, f32>) -> Self {
        let mut pairs: Vec<(u32, f32)> = map.iter().map(|(i, w)| (*i, *w)).collect();
        pairs.sort_unstable_by_key(|(i, _)| *i);

        Self {
            indices: pairs.iter().map(|(i, _)| *i).collect(),
            values: pairs.iter().map(|(_, w)| *w).collect(),
        }
    }

    /// Returns `true` when the vector carries no terms.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Dot product with another sparse vector.
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let mut score = 0.0;
        let mut a = 0;
        let mut b = 0;

        while a < self.indices.len() && b < other.indices.len() {
            match self.indices[a].cmp(&other.indices[b]) {
                std::cmp::Ordering::Less => a += 1,
                std::cmp::Ordering::Greater => b += 1,
                std::cmp::Ordering::Equal => {
                    score += self.values[a] * other.values[b];
                    a += 1;
                    b += 1;
                }
            }
        }

        score
    }
}

/// Store-facing record: named dense vectors, one sparse vector, an optional
/// multi-vector, and a payload map.
///
/// A point must carry exactly the vector names the target collection
/// declares; the store rejects extras and absences.
#[derive(Debug, Clone, Default)]
pub struct StorePoint {
    /// Point id.
    pub id: String,
    /// Named dense vectors.
    pub dense: HashMap<String, Vec<f32>>,
    /// Named sparse vector.
    pub sparse: Option<(String, SparseVector)>,
    /// Named multi-vector (token-level vectors for late interaction).
    pub multi: Option<(String, Vec<Vec<f32>>)>,
    /// Payload fields.
    pub payload: serde_json::Map<String, serde_json::Value>,
}

impl StorePoint {
    /// Creates an empty point with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Adds a named dense vector.
    pub fn with_dense(mut self, name: &str, vector: Vec<f32>) -> Self {
        self.dense.insert(name.to_string(), vector);
        self
    }

    /// Sets the named sparse vector.
    pub fn with_sparse(mut self, name: &str, vector: SparseVector) -> Self {
        self.sparse = Some((name.to_string(), vector));
        self
    }

    /// Sets the named multi-vector.
    pub fn with_multi(mut self, name: &str, vectors: Vec<Vec<f32>>) -> Self {
        self.multi = Some((name.to_string(), vectors));
        self
    }

    /// Sets a payload field.
    pub fn with_payload_field(mut self, key: &str, value: serde_json::Value) -> Self {
        self.payload.insert(key.to_string(), value);
        self
    }
}

/// Payload filter applied to every store query.
///
/// `org_id` is mandatory: retrieval refuses to issue a query without tenant
/// isolation.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreFilter {
    /// Tenant isolation key (exact match).
    pub org_id: String,
    /// Session scope (exact match).
    pub session_id: Option<String>,
    /// Memory type tag (exact match).
    pub type_tag: Option<String>,
    /// Inclusive `[start_ms, end_ms]` range on the `timestamp` payload field.
    pub time_range: Option<(i64, i64)>,
    /// Keep points whose `vt_end` payload field is strictly greater.
    pub vt_end_after: Option<i64>,
}

impl StoreFilter {
    /// Creates a tenant-only filter.
    pub fn for_org(org_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            session_id: None,
            type_tag: None,
            time_range: None,
            vt_end_after: None,
        }
    }

    /// Returns a copy scoped to one session.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// One scored hit from a store query.
#[derive(Debug, Clone)]
pub struct StoreHit {
    /// Point id.
    pub id: PointId,
    /// Similarity score reported by the store.
    pub score: f32,
    /// Point payload.
    pub payload: serde_json::Map<String, serde_json::Value>,
}

/// Collection metadata.
#[derive(Debug, Clone, Copy)]
pub struct CollectionInfo {
    /// Number of points in the collection.
    pub points_count: u64,
}

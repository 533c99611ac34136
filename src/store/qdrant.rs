use qdrant_client::Payload;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, Filter, NamedVectors, PointStruct, Query, QueryPointsBuilder, Range,
    UpsertPointsBuilder, Vector, VectorInput, point_id::PointIdOptions, value::Kind,
};

use super::error::StoreError;
use super::model::{CollectionInfo, PointId, SparseVector, StoreFilter, StoreHit, StorePoint};
use super::VectorStore;
use async_trait::async_trait;

/// Qdrant-backed [`VectorStore`].
#[derive(Clone)]
pub struct QdrantStore {
    client: std::sync::Arc<Qdrant>,
    url: String,
}

impl QdrantStore {
    /// Connects to the Qdrant endpoint at `url`.
    pub fn new(url: &str) -> Result<Self, StoreError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| StoreError::ConnectionFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client: std::sync::Arc::new(client),
            url: url.to_string(),
        })
    }

    /// Returns the configured URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn build_filter(filter: &StoreFilter) -> Filter {
        let mut conditions = vec![Condition::matches("org_id", filter.org_id.clone())];

        if let Some(ref session_id) = filter.session_id {
            conditions.push(Condition::matches("session_id", session_id.clone()));
        }

        if let Some(ref type_tag) = filter.type_tag {
            conditions.push(Condition::matches("type", type_tag.clone()));
        }

        if let Some((start_ms, end_ms)) = filter.time_range {
            conditions.push(Condition::range(
                "timestamp",
                Range {
                    gte: Some(start_ms as f64),
                    lte: Some(end_ms as f64),
                    ..Default::default()
                },
            ));
        }

        if let Some(vt_end) = filter.vt_end_after {
            conditions.push(Condition::range(
                "vt_end",
                Range {
                    gt: Some(vt_end as f64),
                    ..Default::default()
                },
            ));
        }

        Filter::must(conditions)
    }

    fn build_point(point: StorePoint) -> Result<PointStruct, StoreError> {
        let mut vectors = NamedVectors::default();

        for (name, dense) in point.dense {
            vectors = vectors.add_vector(name, Vector::new_dense(dense));
        }

        if let Some((name, sparse)) = point.sparse {
            vectors = vectors.add_vector(name, Vector::new_sparse(sparse.indices, sparse.values));
        }

        if let Some((name, multi)) = point.multi {
            vectors = vectors.add_vector(name, Vector::new_multi(multi));
        }

        let payload = Payload::try_from(serde_json::Value::Object(point.payload)).map_err(|e| {
            StoreError::InvalidPayload {
                message: e.to_string(),
            }
        })?;

        Ok(PointStruct::new(point.id, vectors, payload))
    }

    fn hit_from_scored_point(point: qdrant_client::qdrant::ScoredPoint) -> Option<StoreHit> {
        let id = match point.id.and_then(|pid| pid.point_id_options) {
            Some(PointIdOptions::Num(n)) => PointId::Num(n),
            Some(PointIdOptions::Uuid(u)) => PointId::Uuid(u),
            None => return None,
        };

        let payload = point
            .payload
            .into_iter()
            .map(|(k, v)| (k, qdrant_value_to_json(v)))
            .collect();

        Some(StoreHit {
            id,
            score: point.score,
            payload,
        })
    }

    async fn run_query(
        &self,
        collection: &str,
        builder: QueryPointsBuilder,
    ) -> Result<Vec<StoreHit>, StoreError> {
        let response =
            self.client
                .query(builder)
                .await
                .map_err(|e| StoreError::QueryFailed {
                    collection: collection.to_string(),
                    message: e.to_string(),
                })?;

        Ok(response
            .result
            .into_iter()
            .filter_map(Self::hit_from_scored_point)
            .collect())
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn query_dense(
        &self,
        collection: &str,
        vector_name: &str,
        vector: Vec<f32>,
        filter: &StoreFilter,
        limit: usize,
    ) -> Result<Vec<StoreHit>, StoreError> {
        let builder = QueryPointsBuilder::new(collection)
            .query(Query::new_nearest(vector))
            .using(vector_name)
            .filter(Self::build_filter(filter))
            .limit(limit as u64)
            .with_payload(true);

        self.run_query(collection, builder).await
    }

    async fn query_sparse(
        &self,
        collection: &str,
        vector_name: &str,
        vector: SparseVector,
        filter: &StoreFilter,
        limit: usize,
    ) -> Result<Vec<StoreHit>, StoreError> {
        let builder = QueryPointsBuilder::new(collection)
            .query(Query::new_nearest(VectorInput::new_sparse(
                vector.indices,
                vector.values,
            )))
            .using(vector_name)
            .filter(Self::build_filter(filter))
            .limit(limit as u64)
            .with_payload(true);

        self.run_query(collection, builder).await
    }

    async fn upsert(&self, collection: &str, points: Vec<StorePoint>) -> Result<(), StoreError> {
        if points.is_empty() {
            return Ok(());
        }

        let points = points
            .into_iter()
            .map(Self::build_point)
            .collect::<Result<Vec<_>, _>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(|e| StoreError::UpsertFailed {
                collection: collection.to_string(),
                message: e.to_string(),
            })?;

        Ok(())
    }

    async fn collection_info(&self, collection: &str) -> Result<CollectionInfo, StoreError> {
        let response = self.client.collection_info(collection).await.map_err(|e| {
            StoreError::QueryFailed {
                collection: collection.to_string(),
                message: e.to_string(),
            }
        })?;

        let info = response
            .result
            .ok_or_else(|| StoreError::CollectionNotFound {
                collection: collection.to_string(),
            })?;

        Ok(CollectionInfo {
            points_count: info.points_count.unwrap_or(0),
        })
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let response =
            self.client
                .list_collections()
                .await
                .map_err(|e| StoreError::ConnectionFailed {
                    url: self.url.clone(),
                    message: e.to_string(),
                })?;

        Ok(response
            .collections
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    async fn delete_collection(&self, collection: &str) -> Result<bool, StoreError> {
        let response = self
            .client
            .delete_collection(collection)
            .await
            .map_err(|e| StoreError::DeleteFailed {
                collection: collection.to_string(),
                message: e.to_string(),
            })?;

        Ok(response.result)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.client
            .health_check()
            .await
            .map_err(|e| StoreError::ConnectionFailed {
                url: self.url.clone(),
                message: e.to_string(),
            })?;
        Ok(())
    }
}

fn qdrant_value_to_json(value: qdrant_client::qdrant::Value) -> serde_json::Value {
    match value.kind {
        Some(Kind::NullValue(_)) | None => serde_json::Value::Null,
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(Kind::IntegerValue(i)) => serde_json::Value::from(i),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(d)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Some(Kind::StringValue(s)) => serde_json::Value::String(s),
        Some(Kind::ListValue(list)) => serde_json::Value::Array(
            list.values.into_iter().map(qdrant_value_to_json).collect(),
        ),
        Some(Kind::StructValue(s)) => serde_json::Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, qdrant_value_to_json(v)))
                .collect(),
        ),
    }
}

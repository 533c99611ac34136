//! Session-aware two-stage retriever.
//!
//! Repositories organised as sessions of turns get a hierarchical search:
//! stage 1 finds candidate sessions by their summaries, stage 2 drills into
//! each candidate's turns (in parallel, bounded by a semaphore), stage 3
//! flattens, optionally reranks, and truncates. Every result carries its
//! session attribution so callers can render provenance.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::constants::TEXT_DENSE_FIELD;
use crate::embedding::EmbedderRegistry;
use crate::rerankers::RerankerRouter;
use crate::store::{PointId, StoreFilter, StoreHit, VectorStore};

use super::error::RetrievalError;

/// Session retriever tuning; adjustable at runtime.
#[derive(Debug, Clone)]
pub struct SessionRetrieverConfig {
    /// Candidate sessions fetched in stage 1.
    pub top_sessions: usize,
    /// Turns fetched per candidate session in stage 2.
    pub turns_per_session: usize,
    /// Results returned after stage 3.
    pub final_top_k: usize,
    /// Collection holding session summaries.
    pub session_collection: String,
    /// Collection holding turns.
    pub turn_collection: String,
    /// Fan stage 2 out concurrently.
    pub parallel_turn_retrieval: bool,
    /// Rerank the flattened turns.
    pub rerank: bool,
}

impl Default for SessionRetrieverConfig {
    fn default() -> Self {
        Self {
            top_sessions: 5,
            turns_per_session: 5,
            final_top_k: 10,
            session_collection: "recall_sessions".to_string(),
            turn_collection: "recall_turns".to_string(),
            parallel_turn_retrieval: true,
            rerank: true,
        }
    }
}

/// One turn with session attribution.
#[derive(Debug, Clone)]
pub struct SessionSearchResult {
    /// Turn id.
    pub id: PointId,
    /// Turn similarity score.
    pub score: f32,
    /// Reranker score, when stage 3 reranked.
    pub reranker_score: Option<f32>,
    /// Turn content.
    pub content: String,
    /// Turn payload.
    pub payload: serde_json::Map<String, serde_json::Value>,
    /// Session the turn belongs to.
    pub session_id: String,
    /// Summary of that session.
    pub session_summary: String,
    /// Stage-1 score of that session.
    pub session_score: f32,
}

struct SessionCandidate {
    session_id: String,
    summary: String,
    score: f32,
}

/// Two-stage session/turn retriever.
pub struct SessionAwareRetriever {
    store: Arc<dyn VectorStore>,
    embedders: Arc<EmbedderRegistry>,
    router: Arc<RerankerRouter>,
    config: RwLock<SessionRetrieverConfig>,
}

impl SessionAwareRetriever {
    /// Creates the retriever over shared collaborators.
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedders: Arc<EmbedderRegistry>,
        router: Arc<RerankerRouter>,
        config: SessionRetrieverConfig,
    ) -> Self {
        Self {
            store,
            embedders,
            router,
            config: RwLock::new(config),
        }
    }

    /// Current configuration snapshot.
    pub fn get_config(&self) -> SessionRetrieverConfig {
        self.config.read().clone()
    }

    /// Adjusts stage sizes at runtime; `None` keeps the current value.
    pub fn update_config(
        &self,
        top_sessions: Option<usize>,
        turns_per_session: Option<usize>,
        final_top_k: Option<usize>,
    ) {
        let mut config = self.config.write();
        if let Some(value) = top_sessions {
            config.top_sessions = value;
        }
        if let Some(value) = turns_per_session {
            config.turns_per_session = value;
        }
        if let Some(value) = final_top_k {
            config.final_top_k = value;
        }
    }

    /// Warms the text embedder this retriever depends on.
    pub async fn preload(&self) -> Result<(), RetrievalError> {
        let embedder = self
            .embedders
            .text()
            .await
            .map_err(|e| RetrievalError::EmbedderFailed {
                reason: e.to_string(),
            })?;

        embedder
            .load()
            .await
            .map_err(|e| RetrievalError::EmbedderFailed {
                reason: e.to_string(),
            })
    }

    /// Runs the two-stage retrieval for one tenant.
    pub async fn retrieve(
        &self,
        query_text: &str,
        org_id: &str,
    ) -> Result<Vec<SessionSearchResult>, RetrievalError> {
        if org_id.is_empty() {
            return Err(RetrievalError::TenantMissing);
        }

        let config = self.get_config();

        let embedder = self
            .embedders
            .text()
            .await
            .map_err(|e| RetrievalError::EmbedderFailed {
                reason: e.to_string(),
            })?;
        let query_vector =
            embedder
                .embed(query_text, true)
                .await
                .map_err(|e| RetrievalError::EmbedderFailed {
                    reason: e.to_string(),
                })?;

        let sessions = self
            .retrieve_sessions(&config, org_id, query_vector.clone())
            .await?;

        if sessions.is_empty() {
            debug!("no candidate sessions found");
            return Ok(vec![]);
        }

        let turns = self
            .retrieve_turns(&config, org_id, &query_vector, &sessions)
            .await;

        let mut results = turns;
        if config.rerank {
            results = self.rerank_turns(query_text, results).await;
        } else {
            results.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        results.truncate(config.final_top_k);
        Ok(results)
    }

    async fn retrieve_sessions(
        &self,
        config: &SessionRetrieverConfig,
        org_id: &str,
        query_vector: Vec<f32>,
    ) -> Result<Vec<SessionCandidate>, RetrievalError> {
        let hits = self
            .store
            .query_dense(
                &config.session_collection,
                TEXT_DENSE_FIELD,
                query_vector,
                &StoreFilter::for_org(org_id),
                config.top_sessions,
            )
            .await
            .map_err(|e| RetrievalError::RetrievalFailed {
                reason: format!("session query failed: {e}"),
            })?;

        debug!(candidates = hits.len(), "stage 1 complete");

        Ok(hits
            .into_iter()
            .map(|hit| {
                let session_id = hit
                    .payload
                    .get("session_id")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| hit.id.to_string());

                let summary = hit
                    .payload
                    .get("summary")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();

                SessionCandidate {
                    session_id,
                    summary,
                    score: hit.score,
                }
            })
            .collect())
    }

    async fn retrieve_turns(
        &self,
        config: &SessionRetrieverConfig,
        org_id: &str,
        query_vector: &[f32],
        sessions: &[SessionCandidate],
    ) -> Vec<SessionSearchResult> {
        if config.parallel_turn_retrieval {
            let semaphore = Arc::new(Semaphore::new(sessions.len().max(1)));

            let futures = sessions.iter().map(|session| {
                let semaphore = Arc::clone(&semaphore);
                async move {
                    // Semaphore bounds the fan-out to the stage-1 width even
                    // if the config changes mid-flight.
                    let _permit = semaphore.acquire().await;
                    self.turns_for_session(config, org_id, query_vector, session)
                        .await
                }
            });

            futures_util::future::join_all(futures)
                .await
                .into_iter()
                .flatten()
                .collect()
        } else {
            let mut results = Vec::new();
            for session in sessions {
                results.extend(
                    self.turns_for_session(config, org_id, query_vector, session)
                        .await,
                );
            }
            results
        }
    }

    /// Stage-2 query for one session. Failures degrade that session to an
    /// empty contribution; the request proceeds.
    async fn turns_for_session(
        &self,
        config: &SessionRetrieverConfig,
        org_id: &str,
        query_vector: &[f32],
        session: &SessionCandidate,
    ) -> Vec<SessionSearchResult> {
        let filter = StoreFilter::for_org(org_id).with_session(&session.session_id);

        match self
            .store
            .query_dense(
                &config.turn_collection,
                TEXT_DENSE_FIELD,
                query_vector.to_vec(),
                &filter,
                config.turns_per_session,
            )
            .await
        {
            Ok(hits) => hits
                .into_iter()
                .map(|hit| to_session_result(hit, session))
                .collect(),
            Err(e) => {
                warn!(session_id = %session.session_id, error = %e, "turn query failed, skipping session");
                vec![]
            }
        }
    }

    async fn rerank_turns(
        &self,
        query_text: &str,
        mut results: Vec<SessionSearchResult>,
    ) -> Vec<SessionSearchResult> {
        if results.is_empty() {
            return results;
        }

        let texts: Vec<String> = results.iter().map(|r| r.content.clone()).collect();
        let outcome = self.router.rerank(query_text, &texts, None, None).await;

        if outcome.degraded {
            // Keep stage-2 ordering; session results carry no degraded flag,
            // the missing reranker_score is the signal.
            results.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            return results;
        }

        let mut items: Vec<Option<SessionSearchResult>> = results.into_iter().map(Some).collect();
        let mut reordered = Vec::with_capacity(items.len());

        for ranked in outcome.results {
            if let Some(mut item) = items.get_mut(ranked.original_index).and_then(Option::take) {
                item.reranker_score = Some(ranked.score);
                reordered.push(item);
            }
        }
        for item in items.into_iter().flatten() {
            reordered.push(item);
        }

        reordered
    }
}

fn to_session_result(hit: StoreHit, session: &SessionCandidate) -> SessionSearchResult {
    let content = hit
        .payload
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    SessionSearchResult {
        id: hit.id,
        score: hit.score,
        reranker_score: None,
        content,
        payload: hit.payload,
        session_id: session.session_id.clone(),
        session_summary: session.summary.clone(),
        session_score: session.score,
    }
}

//! Thin HTTP surface.
//!
//! Request validation (ranges, non-empty text) happens here, before the
//! retrieval core is entered; the core itself only enforces tenant
//! isolation. Everything else - auth, rate limiting of callers, metrics -
//! is out of scope for this service.

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::embedding::EmbedderRegistry;
use crate::retrieval::{HybridRetriever, RetrievalError, SearchQuery, SearchResponse};
use crate::store::VectorStore;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// The retrieval pipeline.
    pub retriever: Arc<HybridRetriever>,
    /// Store handle for health checks.
    pub store: Arc<dyn VectorStore>,
    /// Registry handle for readiness reporting.
    pub embedders: Arc<EmbedderRegistry>,
}

/// Builds the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/search", post(search))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

fn validate(query: &SearchQuery) -> Result<(), String> {
    if query.text.trim().is_empty() {
        return Err("text must not be empty".to_string());
    }
    if !(1..=100).contains(&query.limit) {
        return Err(format!("limit {} not in 1..=100", query.limit));
    }
    if !(0.0..=1.0).contains(&query.threshold) {
        return Err(format!("threshold {} not in [0, 1]", query.threshold));
    }
    if !(1..=100).contains(&query.rerank_depth) {
        return Err(format!("rerank_depth {} not in 1..=100", query.rerank_depth));
    }
    Ok(())
}

async fn search(
    State(state): State<AppState>,
    axum::Json(query): axum::Json<SearchQuery>,
) -> Response {
    if let Err(message) = validate(&query) {
        return error_response(StatusCode::BAD_REQUEST, message);
    }

    let started = Instant::now();

    match state.retriever.search(&query).await {
        Ok(results) => {
            let took_ms = started.elapsed().as_millis() as u64;
            info!(
                total = results.len(),
                took_ms,
                degraded = results.iter().any(|r| r.degraded),
                "search served"
            );

            let total = results.len();
            axum::Json(SearchResponse {
                results,
                total,
                took_ms,
            })
            .into_response()
        }
        Err(RetrievalError::TenantMissing) => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, "filters.org_id is required")
        }
        Err(e @ RetrievalError::RetrievalFailed { .. })
        | Err(e @ RetrievalError::EmbedderFailed { .. }) => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    embedders_loaded: usize,
}

async fn healthz(State(state): State<AppState>) -> Response {
    match state.store.health_check().await {
        Ok(()) => axum::Json(HealthBody {
            status: "ok",
            embedders_loaded: state.embedders.len().await,
        })
        .into_response(),
        Err(e) => error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}

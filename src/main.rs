//! Service entry point: configuration, collaborator wiring, HTTP serving.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use recall::api::{AppState, router};
use recall::config::Config;
use recall::embedding::{EmbedderRegistry, RegistryConfig};
use recall::llm::{GenAiClient, LlmClient};
use recall::ratelimit::SlidingWindowRateLimiter;
use recall::rerankers::{RerankerRouter, RouterConfig, TierSet};
use recall::retrieval::{HybridRetriever, RetrieverConfig};
use recall::store::{QdrantStore, VectorStore};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("loading configuration")?;
    config.validate().context("validating configuration")?;

    info!(qdrant_url = %config.qdrant_url, collection = %config.collection, "starting recall-search");

    let store: Arc<dyn VectorStore> =
        Arc::new(QdrantStore::new(&config.qdrant_url).context("connecting to the vector store")?);

    if let Err(e) = store.health_check().await {
        warn!(error = %e, "vector store not reachable yet, continuing startup");
    }

    let embedders = Arc::new(EmbedderRegistry::new(RegistryConfig::from_config(&config)));
    embedders.preload_all().await;

    let limiter = Arc::new(SlidingWindowRateLimiter::new(
        config.rate_limit_requests_per_hour,
        config.rate_limit_budget_cents,
    ));

    let colbert = embedders
        .colbert()
        .await
        .context("constructing the colbert embedder")?;
    let llm_client: Arc<dyn LlmClient> = Arc::new(GenAiClient::new(config.llm_model.clone()));

    let tiers = TierSet::from_config(&config, colbert, Some(llm_client))
        .context("building reranking tiers")?;
    let reranker_router = Arc::new(RerankerRouter::new(
        tiers,
        limiter,
        RouterConfig {
            timeout: std::time::Duration::from_millis(config.rerank_timeout_ms),
            moderate_tier_colbert: config.moderate_tier_colbert,
            ..RouterConfig::default()
        },
    ));

    let retriever = Arc::new(HybridRetriever::new(
        Arc::clone(&store),
        Arc::clone(&embedders),
        reranker_router,
        RetrieverConfig::from_config(&config),
    ));

    // The indexing consumer needs a wired broker implementation; deployments
    // run it from their own binary with their broker of choice.
    info!("indexing consumer not started: no broker wired in this binary");

    let state = AppState {
        retriever,
        store,
        embedders,
    };

    let listener = tokio::net::TcpListener::bind(config.socket_addr())
        .await
        .with_context(|| format!("binding {}", config.socket_addr()))?;

    info!(addr = %config.socket_addr(), "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .context("serving")?;

    Ok(())
}

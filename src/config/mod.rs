//! Environment configuration.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::net::IpAddr;
use std::path::PathBuf;

use crate::constants::{
    DEFAULT_RERANK_DEPTH, MIN_SCORE_DENSE, MIN_SCORE_HYBRID, MIN_SCORE_SPARSE, RERANK_TIMEOUT_MS,
    RRF_K,
};
use crate::retrieval::SearchStrategy;

/// Default Qdrant gRPC endpoint.
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

#[derive(Debug, Clone)]
/// Service configuration, loaded from `RECALL_*` environment variables.
pub struct Config {
    /// HTTP listen port.
    pub port: u16,

    /// HTTP bind address.
    pub bind_addr: IpAddr,

    /// Qdrant endpoint URL.
    pub qdrant_url: String,

    /// Primary memory collection.
    pub collection: String,

    /// Session-summary collection for the two-stage retriever.
    pub sessions_collection: String,

    /// Turn-level collection for the two-stage retriever.
    pub turns_collection: String,

    /// Strategy used when the classifier is bypassed.
    pub default_strategy: SearchStrategy,

    /// Score floor for dense retrieval.
    pub min_score_dense: f32,

    /// Score floor for sparse retrieval.
    pub min_score_sparse: f32,

    /// Score floor for hybrid retrieval.
    pub min_score_hybrid: f32,

    /// Candidates fed into the reranker before trimming to the limit.
    pub rerank_depth: usize,

    /// Per-call reranking timeout in milliseconds.
    pub rerank_timeout_ms: u64,

    /// RRF fusion constant.
    pub rrf_k: usize,

    /// Route moderate-complexity queries to the colbert tier instead of
    /// accurate.
    pub moderate_tier_colbert: bool,

    /// LLM-rerank request cap per sliding window.
    pub rate_limit_requests_per_hour: usize,

    /// LLM-rerank cost cap per sliding window, in cents.
    pub rate_limit_budget_cents: u32,

    /// Maximum documents per index batch.
    pub batch_size: usize,

    /// Maximum milliseconds a pending batch may age before a flush.
    pub flush_interval_ms: u64,

    /// Maximum pending documents before the queue applies backpressure.
    pub max_queue_size: usize,

    /// Generate late-interaction vectors during indexing.
    pub enable_colbert: bool,

    /// Consumer liveness cadence in milliseconds.
    pub heartbeat_interval_ms: u64,

    /// Model used for query expansion and llm-tier reranking.
    pub llm_model: String,

    /// Dense text model directory (stub embeddings when unset).
    pub text_model_path: Option<PathBuf>,

    /// Dense code model directory (stub embeddings when unset).
    pub code_model_path: Option<PathBuf>,

    /// ColBERT model directory (stub embeddings when unset).
    pub colbert_model_path: Option<PathBuf>,

    /// Accurate-tier cross-encoder directory (lexical fallback when unset).
    pub reranker_accurate_path: Option<PathBuf>,

    /// Code-tier cross-encoder directory (lexical fallback when unset).
    pub reranker_code_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5002,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
            collection: "recall_memory".to_string(),
            sessions_collection: "recall_sessions".to_string(),
            turns_collection: "recall_turns".to_string(),
            default_strategy: SearchStrategy::Hybrid,
            min_score_dense: MIN_SCORE_DENSE,
            min_score_sparse: MIN_SCORE_SPARSE,
            min_score_hybrid: MIN_SCORE_HYBRID,
            rerank_depth: DEFAULT_RERANK_DEPTH,
            rerank_timeout_ms: RERANK_TIMEOUT_MS,
            rrf_k: RRF_K,
            moderate_tier_colbert: false,
            rate_limit_requests_per_hour: 100,
            rate_limit_budget_cents: 1_000,
            batch_size: 100,
            flush_interval_ms: 5_000,
            max_queue_size: 1_000,
            enable_colbert: true,
            heartbeat_interval_ms: 30_000,
            llm_model: "gemini-2.5-flash".to_string(),
            text_model_path: None,
            code_model_path: None,
            colbert_model_path: None,
            reranker_accurate_path: None,
            reranker_code_path: None,
        }
    }
}

impl Config {
    const ENV_PORT: &'static str = "RECALL_PORT";
    const ENV_BIND_ADDR: &'static str = "RECALL_BIND_ADDR";
    const ENV_QDRANT_URL: &'static str = "RECALL_QDRANT_URL";
    const ENV_COLLECTION: &'static str = "RECALL_COLLECTION";
    const ENV_SESSIONS_COLLECTION: &'static str = "RECALL_SESSIONS_COLLECTION";
    const ENV_TURNS_COLLECTION: &'static str = "RECALL_TURNS_COLLECTION";
    const ENV_DEFAULT_STRATEGY: &'static str = "RECALL_DEFAULT_STRATEGY";
    const ENV_MIN_SCORE_DENSE: &'static str = "RECALL_MIN_SCORE_DENSE";
    const ENV_MIN_SCORE_SPARSE: &'static str = "RECALL_MIN_SCORE_SPARSE";
    const ENV_MIN_SCORE_HYBRID: &'static str = "RECALL_MIN_SCORE_HYBRID";
    const ENV_RERANK_DEPTH: &'static str = "RECALL_RERANK_DEPTH";
    const ENV_RERANK_TIMEOUT_MS: &'static str = "RECALL_RERANK_TIMEOUT_MS";
    const ENV_RRF_K: &'static str = "RECALL_RRF_K";
    const ENV_MODERATE_TIER_COLBERT: &'static str = "RECALL_MODERATE_TIER_COLBERT";
    const ENV_RATE_LIMIT_REQUESTS: &'static str = "RECALL_RATE_LIMIT_REQUESTS_PER_HOUR";
    const ENV_RATE_LIMIT_BUDGET: &'static str = "RECALL_RATE_LIMIT_BUDGET_CENTS";
    const ENV_BATCH_SIZE: &'static str = "RECALL_BATCH_SIZE";
    const ENV_FLUSH_INTERVAL_MS: &'static str = "RECALL_FLUSH_INTERVAL_MS";
    const ENV_MAX_QUEUE_SIZE: &'static str = "RECALL_MAX_QUEUE_SIZE";
    const ENV_ENABLE_COLBERT: &'static str = "RECALL_ENABLE_COLBERT";
    const ENV_HEARTBEAT_INTERVAL_MS: &'static str = "RECALL_HEARTBEAT_INTERVAL_MS";
    const ENV_LLM_MODEL: &'static str = "RECALL_LLM_MODEL";
    const ENV_TEXT_MODEL_PATH: &'static str = "RECALL_TEXT_MODEL_PATH";
    const ENV_CODE_MODEL_PATH: &'static str = "RECALL_CODE_MODEL_PATH";
    const ENV_COLBERT_MODEL_PATH: &'static str = "RECALL_COLBERT_MODEL_PATH";
    const ENV_RERANKER_ACCURATE_PATH: &'static str = "RECALL_RERANKER_ACCURATE_PATH";
    const ENV_RERANKER_CODE_PATH: &'static str = "RECALL_RERANKER_CODE_PATH";

    /// Loads configuration from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = Self::parse_port_from_env(defaults.port)?;
        let bind_addr = Self::parse_bind_addr_from_env(defaults.bind_addr)?;
        let default_strategy = Self::parse_strategy_from_env(defaults.default_strategy)?;

        Ok(Self {
            port,
            bind_addr,
            qdrant_url: Self::parse_string_from_env(Self::ENV_QDRANT_URL, defaults.qdrant_url),
            collection: Self::parse_string_from_env(Self::ENV_COLLECTION, defaults.collection),
            sessions_collection: Self::parse_string_from_env(
                Self::ENV_SESSIONS_COLLECTION,
                defaults.sessions_collection,
            ),
            turns_collection: Self::parse_string_from_env(
                Self::ENV_TURNS_COLLECTION,
                defaults.turns_collection,
            ),
            default_strategy,
            min_score_dense: Self::parse_f32_from_env(
                Self::ENV_MIN_SCORE_DENSE,
                defaults.min_score_dense,
            ),
            min_score_sparse: Self::parse_f32_from_env(
                Self::ENV_MIN_SCORE_SPARSE,
                defaults.min_score_sparse,
            ),
            min_score_hybrid: Self::parse_f32_from_env(
                Self::ENV_MIN_SCORE_HYBRID,
                defaults.min_score_hybrid,
            ),
            rerank_depth: Self::parse_usize_from_env(Self::ENV_RERANK_DEPTH, defaults.rerank_depth),
            rerank_timeout_ms: Self::parse_u64_from_env(
                Self::ENV_RERANK_TIMEOUT_MS,
                defaults.rerank_timeout_ms,
            ),
            rrf_k: Self::parse_usize_from_env(Self::ENV_RRF_K, defaults.rrf_k),
            moderate_tier_colbert: Self::parse_bool_from_env(
                Self::ENV_MODERATE_TIER_COLBERT,
                defaults.moderate_tier_colbert,
            ),
            rate_limit_requests_per_hour: Self::parse_usize_from_env(
                Self::ENV_RATE_LIMIT_REQUESTS,
                defaults.rate_limit_requests_per_hour,
            ),
            rate_limit_budget_cents: Self::parse_u32_from_env(
                Self::ENV_RATE_LIMIT_BUDGET,
                defaults.rate_limit_budget_cents,
            ),
            batch_size: Self::parse_usize_from_env(Self::ENV_BATCH_SIZE, defaults.batch_size),
            flush_interval_ms: Self::parse_u64_from_env(
                Self::ENV_FLUSH_INTERVAL_MS,
                defaults.flush_interval_ms,
            ),
            max_queue_size: Self::parse_usize_from_env(
                Self::ENV_MAX_QUEUE_SIZE,
                defaults.max_queue_size,
            ),
            enable_colbert: Self::parse_bool_from_env(
                Self::ENV_ENABLE_COLBERT,
                defaults.enable_colbert,
            ),
            heartbeat_interval_ms: Self::parse_u64_from_env(
                Self::ENV_HEARTBEAT_INTERVAL_MS,
                defaults.heartbeat_interval_ms,
            ),
            llm_model: Self::parse_string_from_env(Self::ENV_LLM_MODEL, defaults.llm_model),
            text_model_path: Self::parse_optional_path_from_env(Self::ENV_TEXT_MODEL_PATH),
            code_model_path: Self::parse_optional_path_from_env(Self::ENV_CODE_MODEL_PATH),
            colbert_model_path: Self::parse_optional_path_from_env(Self::ENV_COLBERT_MODEL_PATH),
            reranker_accurate_path: Self::parse_optional_path_from_env(
                Self::ENV_RERANKER_ACCURATE_PATH,
            ),
            reranker_code_path: Self::parse_optional_path_from_env(Self::ENV_RERANKER_CODE_PATH),
        })
    }

    /// Checks cross-field invariants after loading.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rrf_k == 0 {
            return Err(ConfigError::OutOfRange {
                option: "rrf_k",
                reason: "must be positive".to_string(),
            });
        }

        if self.rerank_depth == 0 || self.rerank_depth > 100 {
            return Err(ConfigError::OutOfRange {
                option: "rerank_depth",
                reason: format!("{} not in 1..=100", self.rerank_depth),
            });
        }

        if self.batch_size == 0 {
            return Err(ConfigError::OutOfRange {
                option: "batch_size",
                reason: "must be positive".to_string(),
            });
        }

        if self.batch_size > self.max_queue_size {
            return Err(ConfigError::OutOfRange {
                option: "batch_size",
                reason: format!(
                    "batch_size {} exceeds max_queue_size {}",
                    self.batch_size, self.max_queue_size
                ),
            });
        }

        for (option, value) in [
            ("min_score_dense", self.min_score_dense),
            ("min_score_sparse", self.min_score_sparse),
            ("min_score_hybrid", self.min_score_hybrid),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange {
                    option,
                    reason: format!("{value} not in [0, 1]"),
                });
            }
        }

        Ok(())
    }

    /// Returns the `host:port` listen string.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    fn parse_port_from_env(default: u16) -> Result<u16, ConfigError> {
        match env::var(Self::ENV_PORT) {
            Ok(value) => {
                let port: u16 = value.parse().map_err(|e| ConfigError::PortParseError {
                    value: value.clone(),
                    source: e,
                })?;

                if port == 0 {
                    return Err(ConfigError::InvalidPort { value });
                }

                Ok(port)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_bind_addr_from_env(default: IpAddr) -> Result<IpAddr, ConfigError> {
        match env::var(Self::ENV_BIND_ADDR) {
            Ok(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidBindAddr { value, source: e }),
            Err(_) => Ok(default),
        }
    }

    fn parse_strategy_from_env(default: SearchStrategy) -> Result<SearchStrategy, ConfigError> {
        match env::var(Self::ENV_DEFAULT_STRATEGY) {
            Ok(value) => match value.as_str() {
                "dense" => Ok(SearchStrategy::Dense),
                "sparse" => Ok(SearchStrategy::Sparse),
                "hybrid" => Ok(SearchStrategy::Hybrid),
                _ => Err(ConfigError::UnknownValue {
                    option: "default_strategy",
                    value,
                }),
            },
            Err(_) => Ok(default),
        }
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        env::var(var_name).unwrap_or(default)
    }

    fn parse_optional_path_from_env(var_name: &str) -> Option<PathBuf> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }

    fn parse_u64_from_env(var_name: &str, default: u64) -> u64 {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn parse_u32_from_env(var_name: &str, default: u32) -> u32 {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn parse_usize_from_env(var_name: &str, default: usize) -> usize {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn parse_f32_from_env(var_name: &str, default: f32) -> f32 {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn parse_bool_from_env(var_name: &str, default: bool) -> bool {
        env::var(var_name)
            .ok()
            .and_then(|v| match v.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => Some(true),
                "0" | "false" | "no" => Some(false),
                _ => None,
            })
            .unwrap_or(default)
    }
}

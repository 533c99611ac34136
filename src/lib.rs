//! # Recall Search
//!
//! Hybrid retrieval service for a conversational memory store.
//!
//! A query flows through classification, dense/sparse fan-out against the
//! vector store, Reciprocal Rank Fusion, and tier-routed reranking; writes
//! flow from a durable event stream through a batching queue into a
//! multi-vector indexer.
//!
//! ```text
//! read:  query -> classify -> dense/sparse -> RRF -> rerank -> trim
//! write: event -> consumer -> batch queue -> indexer -> store
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use recall::config::Config;
//!
//! # fn run() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! config.validate()?;
//! println!("Listening on {}", config.socket_addr());
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! | Feature | Purpose |
//! |---------|---------|
//! | `cpu` | CPU-only inference (docs.rs default) |
//! | `metal` | Apple Silicon GPU acceleration |
//! | `cuda` | NVIDIA GPU acceleration |
//! | `mock` | Mock collaborators for tests/examples |
//!
//! ## Modules
//!
//! - [`retrieval`] - classifier, hybrid/session/multi-query retrievers, RRF
//! - [`rerankers`] - reranking tiers and the tier router
//! - [`embedding`] - embedders and the capability registry
//! - [`indexing`] - consumer, batch queue, multi-vector indexer
//! - [`store`] - vector store seam (Qdrant + mock)
//! - [`messaging`] - broker and status bus seams
//! - [`llm`] - LLM provider seam
//! - [`ratelimit`] - sliding-window admission control
//! - [`config`] - environment-backed configuration

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod api;
pub mod config;
pub mod constants;
pub mod embedding;
pub mod indexing;
pub mod llm;
pub mod messaging;
pub mod ratelimit;
pub mod rerankers;
pub mod retrieval;
pub mod store;

pub use config::{Config, ConfigError};
pub use embedding::{
    ColbertConfig, ColbertEmbedder, DenseConfig, DenseEmbedder, EmbedderRegistry, EmbeddingError,
    RegistryConfig, SparseConfig, SparseEmbedder,
};
pub use indexing::{
    BatchConfig, BatchQueue, BatchSink, ConsumerConfig, Document, DocumentIndexer, IndexError,
    IndexerConfig, MemoryEventConsumer, QueueFull,
};
pub use llm::{GenAiClient, LlmClient, LlmError, LlmRequest, LlmResponse, LlmUsage};
#[cfg(any(test, feature = "mock"))]
pub use llm::MockLlmClient;
#[cfg(any(test, feature = "mock"))]
pub use messaging::{MockBroker, MockStatusBus};
pub use messaging::{
    Broker, BrokerError, BrokerMessage, ConsumerStatus, StatusBus, StatusBusError, StatusKind,
    Subscription,
};
pub use ratelimit::{RateLimitError, RateLimiterUsage, SlidingWindowRateLimiter};
pub use rerankers::{
    ColbertReranker, CrossEncoderConfig, CrossEncoderReranker, LexicalReranker, LlmReranker,
    RankedResult, RerankError, RerankOutcome, Reranker, RerankerRouter, RouterConfig, TierSet,
};
pub use retrieval::{
    Classification, ExpansionUsage, HybridRetriever, MultiQueryConfig, MultiQueryRetriever,
    QueryClassifier, QueryComplexity, RerankerTier, RetrievalError, RetrieverConfig, SearchFilters,
    SearchQuery, SearchResponse, SearchResultItem, SearchStrategy, SessionAwareRetriever,
    SessionRetrieverConfig, SessionSearchResult, TimeRange,
};
#[cfg(any(test, feature = "mock"))]
pub use store::MockVectorStore;
pub use store::{
    CollectionInfo, PointId, QdrantStore, SparseVector, StoreError, StoreFilter, StoreHit,
    StorePoint, VectorStore,
};

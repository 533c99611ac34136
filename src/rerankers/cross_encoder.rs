//! Accurate and code tiers: cross-encoder scoring.
//!
//! Scores each query/candidate pair jointly with a BERT
//! sequence-classification head. Without a model directory the tier runs in
//! stub mode and scores lexically, keeping the contract intact for tests
//! and model-less deployments.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::embedding::bert::BertCrossScorer;
use crate::embedding::device::select_device;

use super::error::RerankError;
use super::lexical::LexicalReranker;
use super::{RankedResult, Reranker, finalize_ranking};

/// Construction parameters for a cross-encoder tier.
#[derive(Debug, Clone)]
pub struct CrossEncoderConfig {
    /// Model directory; stub (lexical) scoring when unset.
    pub model_path: Option<PathBuf>,
    /// Maximum joint sequence length.
    pub max_seq_len: usize,
}

impl Default for CrossEncoderConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            max_seq_len: 512,
        }
    }
}

enum ScorerBackend {
    Model(Arc<BertCrossScorer>),
    Stub(LexicalReranker),
}

/// Cross-encoder reranker with stub fallback.
pub struct CrossEncoderReranker {
    backend: ScorerBackend,
}

impl CrossEncoderReranker {
    /// Loads the model when configured, otherwise constructs the stub.
    pub fn load(config: CrossEncoderConfig) -> Result<Self, RerankError> {
        let backend = match config.model_path {
            Some(ref model_dir) => {
                info!(model_dir = %model_dir.display(), "Loading cross-encoder model");
                let scorer = BertCrossScorer::load(model_dir, select_device(), config.max_seq_len)
                    .map_err(|e| RerankError::Inference {
                        reason: format!("cross-encoder load failed: {e}"),
                    })?;
                ScorerBackend::Model(Arc::new(scorer))
            }
            None => {
                info!("No cross-encoder model path configured, operating in stub mode");
                ScorerBackend::Stub(LexicalReranker::new())
            }
        };

        Ok(Self { backend })
    }

    /// Returns `true` when a model is loaded.
    pub fn is_model_loaded(&self) -> bool {
        matches!(self.backend, ScorerBackend::Model(_))
    }
}

#[async_trait]
impl Reranker for CrossEncoderReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_k: Option<usize>,
    ) -> Result<Vec<RankedResult>, RerankError> {
        if documents.is_empty() {
            return Ok(vec![]);
        }

        debug!(
            num_candidates = documents.len(),
            model = self.is_model_loaded(),
            "Cross-encoder reranking"
        );

        let results = match &self.backend {
            ScorerBackend::Model(scorer) => {
                let scorer = Arc::clone(scorer);
                let query = query.to_string();
                let documents = documents.to_vec();

                tokio::task::spawn_blocking(move || {
                    documents
                        .iter()
                        .enumerate()
                        .map(|(original_index, text)| {
                            let score = scorer.score(&query, text)?;
                            Ok(RankedResult {
                                text: text.clone(),
                                score,
                                original_index,
                            })
                        })
                        .collect::<Result<Vec<_>, crate::embedding::EmbeddingError>>()
                })
                .await
                .map_err(|e| RerankError::Inference {
                    reason: format!("scoring task failed: {e}"),
                })?
                .map_err(|e| RerankError::Inference {
                    reason: e.to_string(),
                })?
            }
            ScorerBackend::Stub(lexical) => documents
                .iter()
                .enumerate()
                .map(|(original_index, text)| RankedResult {
                    text: text.clone(),
                    score: lexical.score(query, text),
                    original_index,
                })
                .collect(),
        };

        Ok(finalize_ranking(results, top_k))
    }
}

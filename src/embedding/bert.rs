//! BERT-family model wrappers shared by the dense and late-interaction
//! embedders and the cross-encoder rerankers.

use std::path::Path;

use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::{Tokenizer, TruncationParams};

use super::error::EmbeddingError;

/// Loads a tokenizer from a model directory, with truncation at `max_len`.
pub fn load_tokenizer(model_dir: &Path, max_len: usize) -> Result<Tokenizer, EmbeddingError> {
    let tokenizer_path = model_dir.join("tokenizer.json");

    let mut tokenizer =
        Tokenizer::from_file(&tokenizer_path).map_err(|e| EmbeddingError::TokenizationFailed {
            reason: format!("failed to load {}: {e}", tokenizer_path.display()),
        })?;

    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: max_len,
            ..Default::default()
        }))
        .map_err(|e| EmbeddingError::TokenizationFailed {
            reason: format!("failed to configure truncation: {e}"),
        })?;

    Ok(tokenizer)
}

fn load_bert(model_dir: &Path, device: &Device) -> Result<(BertModel, BertConfig), EmbeddingError> {
    if !model_dir.exists() {
        return Err(EmbeddingError::ModelNotFound {
            path: model_dir.to_path_buf(),
        });
    }

    let config_path = model_dir.join("config.json");
    let weights_path = model_dir.join("model.safetensors");

    let config_content = std::fs::read_to_string(&config_path)?;
    let config: BertConfig =
        serde_json::from_str(&config_content).map_err(|e| EmbeddingError::ModelLoadFailed {
            reason: format!("failed to parse {}: {e}", config_path.display()),
        })?;

    // SAFETY: mmap of a read-only weights file; the file outlives the model.
    let vb = unsafe {
        VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)
            .map_err(|e| EmbeddingError::ModelLoadFailed {
                reason: format!("failed to map safetensors: {e}"),
            })?
    };

    let model = if vb.contains_tensor("bert.embeddings.word_embeddings.weight") {
        BertModel::load(vb.pp("bert"), &config)
    } else {
        BertModel::load(vb, &config)
    }
    .map_err(|e| EmbeddingError::ModelLoadFailed {
        reason: format!("failed to load BERT weights: {e}"),
    })?;

    Ok((model, config))
}

/// Encoder producing token-level and pooled sentence embeddings.
pub struct BertEncoder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    hidden_size: usize,
}

impl BertEncoder {
    /// Loads the encoder from a directory holding `config.json`,
    /// `model.safetensors` and `tokenizer.json`.
    pub fn load(model_dir: &Path, device: Device, max_len: usize) -> Result<Self, EmbeddingError> {
        let tokenizer = load_tokenizer(model_dir, max_len)?;
        let (model, config) = load_bert(model_dir, &device)?;

        Ok(Self {
            model,
            tokenizer,
            device,
            hidden_size: config.hidden_size,
        })
    }

    /// Hidden size of the underlying transformer.
    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    fn forward(&self, text: &str) -> Result<(Tensor, usize), EmbeddingError> {
        let encoding =
            self.tokenizer
                .encode(text, true)
                .map_err(|e| EmbeddingError::TokenizationFailed {
                    reason: e.to_string(),
                })?;

        let token_ids = encoding.get_ids();
        if token_ids.is_empty() {
            return Err(EmbeddingError::TokenizationFailed {
                reason: "no tokens produced".to_string(),
            });
        }

        let input_ids = Tensor::new(token_ids, &self.device)?.unsqueeze(0)?;
        let type_ids = Tensor::new(encoding.get_type_ids(), &self.device)?.unsqueeze(0)?;
        let attention_mask =
            Tensor::new(encoding.get_attention_mask(), &self.device)?.unsqueeze(0)?;

        let hidden = self
            .model
            .forward(&input_ids, &type_ids, Some(&attention_mask))?;

        Ok((hidden, token_ids.len()))
    }

    /// Mean-pooled sentence embedding, truncated to `dim` and L2-normalised.
    pub fn embed_pooled(&self, text: &str, dim: usize) -> Result<Vec<f32>, EmbeddingError> {
        let (hidden, seq_len) = self.forward(text)?;

        let pooled = (hidden.i((0, .., ..dim.min(self.hidden_size)))?.sum(0)?
            / seq_len as f64)?;
        let mut embedding = pooled.to_vec1::<f32>()?;

        normalize(&mut embedding);
        Ok(embedding)
    }

    /// Per-token embeddings, each truncated to `dim` and L2-normalised.
    pub fn embed_tokens(&self, text: &str, dim: usize) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let (hidden, seq_len) = self.forward(text)?;

        let mut vectors = Vec::with_capacity(seq_len);
        for idx in 0..seq_len {
            let mut token = hidden
                .i((0, idx, ..dim.min(self.hidden_size)))?
                .to_vec1::<f32>()?;
            normalize(&mut token);
            vectors.push(token);
        }

        Ok(vectors)
    }
}

/// BERT sequence-classification head producing a single relevance logit per
/// query/candidate pair. Used by the cross-encoder reranking tiers.
pub struct BertCrossScorer {
    model: BertModel,
    classifier: Linear,
    tokenizer: Tokenizer,
    device: Device,
}

impl BertCrossScorer {
    /// Loads the scorer from a model directory.
    pub fn load(model_dir: &Path, device: Device, max_len: usize) -> Result<Self, EmbeddingError> {
        let tokenizer = load_tokenizer(model_dir, max_len)?;

        if !model_dir.exists() {
            return Err(EmbeddingError::ModelNotFound {
                path: model_dir.to_path_buf(),
            });
        }

        let config_path = model_dir.join("config.json");
        let weights_path = model_dir.join("model.safetensors");

        let config_content = std::fs::read_to_string(&config_path)?;
        let config: BertConfig =
            serde_json::from_str(&config_content).map_err(|e| EmbeddingError::ModelLoadFailed {
                reason: format!("failed to parse {}: {e}", config_path.display()),
            })?;

        // SAFETY: mmap of a read-only weights file; the file outlives the model.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device).map_err(
                |e| EmbeddingError::ModelLoadFailed {
                    reason: format!("failed to map safetensors: {e}"),
                },
            )?
        };

        let model = if vb.contains_tensor("bert.embeddings.word_embeddings.weight") {
            BertModel::load(vb.pp("bert"), &config)
        } else {
            BertModel::load(vb.clone(), &config)
        }
        .map_err(|e| EmbeddingError::ModelLoadFailed {
            reason: format!("failed to load BERT weights: {e}"),
        })?;

        let classifier = candle_nn::linear(config.hidden_size, 1, vb.pp("classifier")).map_err(
            |e| EmbeddingError::ModelLoadFailed {
                reason: format!("failed to load classifier head: {e}"),
            },
        )?;

        Ok(Self {
            model,
            classifier,
            tokenizer,
            device,
        })
    }

    /// Scores a query/candidate pair; higher means more relevant.
    pub fn score(&self, query: &str, candidate: &str) -> Result<f32, EmbeddingError> {
        let encoding = self
            .tokenizer
            .encode((query, candidate), true)
            .map_err(|e| EmbeddingError::TokenizationFailed {
                reason: e.to_string(),
            })?;

        let input_ids = Tensor::new(encoding.get_ids(), &self.device)?.unsqueeze(0)?;
        let type_ids = Tensor::new(encoding.get_type_ids(), &self.device)?.unsqueeze(0)?;
        let attention_mask =
            Tensor::new(encoding.get_attention_mask(), &self.device)?.unsqueeze(0)?;

        let hidden = self
            .model
            .forward(&input_ids, &type_ids, Some(&attention_mask))?;
        let cls = hidden.i((.., 0, ..))?;
        let logits = self.classifier.forward(&cls)?;

        Ok(logits.flatten_all()?.to_vec1::<f32>()?[0])
    }
}

/// L2-normalises a vector in place (no-op on zero vectors).
pub fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

//! Embedding models and the capability registry.
//!
//! Four capability classes feed the pipeline:
//!
//! - [`DenseEmbedder`] - semantic vectors for conversational text and code
//!   (two instances with different construction parameters);
//! - [`SparseEmbedder`] - lexical index -> weight maps for keyword search;
//! - [`ColbertEmbedder`] - token-level multi-vectors for late interaction.
//!
//! [`EmbedderRegistry`] owns one lazily-built instance per class. Model-backed
//! classes fall back to deterministic stub vectors when no model directory is
//! configured.

/// BERT model wrappers (encoder + cross-scorer).
pub mod bert;
/// Late-interaction embedder.
pub mod colbert;
/// Dense text/code embedder.
pub mod dense;
/// Device selection (CPU / Metal / CUDA).
pub mod device;
mod error;
/// Capability registry.
pub mod registry;
/// Lexical sparse embedder.
pub mod sparse;

#[cfg(test)]
mod tests;

pub use colbert::{ColbertConfig, ColbertEmbedder};
pub use dense::{DenseConfig, DenseEmbedder};
pub use error::EmbeddingError;
pub use registry::{EmbedderRegistry, RegistryConfig};
pub use sparse::{SparseConfig, SparseEmbedder};

//! Embedding and cross-encoder oracles.
//!
//! - [`e5`] turns text into vectors for semantic search ([`TextEmbedder`]).
//! - [`reranker`] scores `(query, passage)` pairs ([`CrossEncoder`]).
//!
//! Both run a BERT checkpoint through candle when a model directory is
//! configured and fall back to deterministic stubs otherwise.

/// BERT heads (encoder + classifier).
pub mod bert;
/// Device selection (CPU / Metal / CUDA).
pub mod device;
/// e5-style sentence embedder.
pub mod e5;
mod error;
/// Cross-encoder reranker.
pub mod reranker;
/// Tokenizer loading helpers.
pub mod utils;

pub use device::{DevicePreference, select_device};
pub use e5::{E5Config, E5Embedder};
pub use error::EmbeddingError;
pub use reranker::{Reranker, RerankerConfig, RerankerError};

/// How a text is going to be used; e5 models embed queries and passages
/// with different prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedRole {
    Query,
    Passage,
}

impl EmbedRole {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Query => "query: ",
            Self::Passage => "passage: ",
        }
    }
}

/// `(text, role) -> unit vector`.
pub trait TextEmbedder: Send + Sync {
    fn embed(&self, text: &str, role: EmbedRole) -> Result<Vec<f32>, EmbeddingError>;

    fn embed_batch(&self, texts: &[&str], role: EmbedRole) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|text| self.embed(text, role)).collect()
    }

    /// Output vector length.
    fn dimension(&self) -> usize;
}

/// `(query, passage) -> unbounded relevance score`, batched per query.
pub trait CrossEncoder: Send + Sync {
    fn score_batch(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>, RerankerError>;
}

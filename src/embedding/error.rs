use std::path::PathBuf;

use thiserror::Error;

use crate::constants::DimValidationError;

/// Failures of the e5 embedder and of the model plumbing it shares with the
/// cross-encoder (device selection, BERT loading, tokenizers).
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The configured model directory does not exist.
    #[error("e5 model directory not found: {path}")]
    ModelNotFound { path: PathBuf },

    /// Weights, config or tokenizer could not be read.
    #[error("could not load e5 model: {reason}")]
    ModelLoadFailed { reason: String },

    /// The preferred accelerator is missing or not compiled in.
    #[error("{device} device unavailable: {reason}")]
    DeviceUnavailable { device: String, reason: String },

    /// Forward pass or pooling failed.
    #[error("could not embed text: {reason}")]
    InferenceFailed { reason: String },

    #[error("could not tokenize text: {reason}")]
    TokenizationFailed { reason: String },

    #[error("invalid embedder settings: {reason}")]
    InvalidConfig { reason: String },

    /// The model output does not match the collection vector size.
    #[error(transparent)]
    DimensionMismatch(#[from] DimValidationError),
}

impl From<candle_core::Error> for EmbeddingError {
    fn from(err: candle_core::Error) -> Self {
        Self::InferenceFailed {
            reason: err.to_string(),
        }
    }
}

impl From<std::io::Error> for EmbeddingError {
    fn from(err: std::io::Error) -> Self {
        Self::ModelLoadFailed {
            reason: err.to_string(),
        }
    }
}

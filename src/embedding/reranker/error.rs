use thiserror::Error;

use crate::embedding::error::EmbeddingError;

/// Failures of the cross-encoder. The retriever treats every one of them as
/// "skip reranking" and keeps the fused order.
#[derive(Debug, Error)]
pub enum RerankerError {
    #[error("could not load cross-encoder: {reason}")]
    ModelLoadFailed { reason: String },

    #[error("{device} device unavailable: {reason}")]
    DeviceUnavailable { device: String, reason: String },

    #[error("could not score passages: {reason}")]
    InferenceFailed { reason: String },

    #[error("could not tokenize (query, passage) pair: {reason}")]
    TokenizationFailed { reason: String },

    #[error("invalid cross-encoder settings: {reason}")]
    InvalidConfig { reason: String },

    /// The oracle returned a different number of scores than passages sent.
    #[error("cross-encoder returned {actual} scores for {expected} passages")]
    ScoreCountMismatch { expected: usize, actual: usize },
}

impl From<candle_core::Error> for RerankerError {
    fn from(err: candle_core::Error) -> Self {
        Self::InferenceFailed {
            reason: err.to_string(),
        }
    }
}

/// Device errors keep their kind; anything else from the shared plumbing is
/// an inference failure.
impl From<EmbeddingError> for RerankerError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::DeviceUnavailable { device, reason } => {
                Self::DeviceUnavailable { device, reason }
            }
            EmbeddingError::ModelNotFound { path } => Self::ModelLoadFailed {
                reason: format!("model directory not found: {}", path.display()),
            },
            other => Self::InferenceFailed {
                reason: other.to_string(),
            },
        }
    }
}

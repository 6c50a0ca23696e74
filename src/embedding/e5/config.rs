use std::path::PathBuf;

use crate::embedding::device::DevicePreference;
use crate::embedding::error::EmbeddingError;

/// Default e5 embedding dimension (`multilingual-e5-small`).
pub const E5_EMBEDDING_DIM: usize = crate::constants::DEFAULT_EMBEDDING_DIM;

/// Default e5 max sequence length.
pub const E5_MAX_SEQ_LEN: usize = crate::constants::DEFAULT_MAX_SEQ_LEN;

#[derive(Debug, Clone)]
/// Configuration for [`E5Embedder`](super::E5Embedder).
pub struct E5Config {
    /// Directory containing `config.json`, `model.safetensors` and `tokenizer.json`.
    /// `None` selects the deterministic stub.
    pub model_dir: Option<PathBuf>,
    /// Max tokens per input.
    pub max_seq_len: usize,
    /// Output embedding dimension (must match the model's hidden size).
    pub embedding_dim: usize,
    /// Device preference.
    pub device: DevicePreference,
}

impl Default for E5Config {
    fn default() -> Self {
        Self {
            model_dir: None,
            max_seq_len: E5_MAX_SEQ_LEN,
            embedding_dim: E5_EMBEDDING_DIM,
            device: DevicePreference::Auto,
        }
    }
}

impl E5Config {
    /// Creates a config for a model directory.
    pub fn new<P: Into<PathBuf>>(model_dir: P) -> Self {
        Self {
            model_dir: Some(model_dir.into()),
            ..Default::default()
        }
    }

    /// Creates a stub config (no model files; produces deterministic embeddings).
    pub fn stub() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, device: DevicePreference) -> Self {
        self.device = device;
        self
    }

    pub fn with_embedding_dim(mut self, embedding_dim: usize) -> Self {
        self.embedding_dim = embedding_dim;
        self
    }

    pub fn is_stub(&self) -> bool {
        self.model_dir.is_none()
    }

    /// Validates dimensions and, outside stub mode, the model directory layout.
    pub fn validate(&self) -> Result<(), EmbeddingError> {
        if self.embedding_dim == 0 {
            return Err(EmbeddingError::InvalidConfig {
                reason: "embedding_dim must be positive".to_string(),
            });
        }
        if self.max_seq_len == 0 {
            return Err(EmbeddingError::InvalidConfig {
                reason: "max_seq_len must be positive".to_string(),
            });
        }

        if let Some(ref dir) = self.model_dir {
            if !dir.is_dir() {
                return Err(EmbeddingError::ModelNotFound { path: dir.clone() });
            }
            for required in ["config.json", "model.safetensors", "tokenizer.json"] {
                if !dir.join(required).exists() {
                    return Err(EmbeddingError::ModelLoadFailed {
                        reason: format!("Missing {} in {}", required, dir.display()),
                    });
                }
            }
        }

        Ok(())
    }
}

use std::path::PathBuf;

use super::error::RerankerError;
use crate::embedding::device::DevicePreference;

pub const MAX_SEQ_LEN: usize = crate::constants::DEFAULT_MAX_SEQ_LEN;

/// Cross-encoder settings. Mirrors [`E5Config`](crate::embedding::E5Config):
/// no model directory means stub scoring.
#[derive(Debug, Clone)]
pub struct RerankerConfig {
    /// Model directory (`config.json`, `model.safetensors`, `tokenizer.json`).
    pub model_dir: Option<PathBuf>,

    /// Token budget for the `(query, passage)` pair; longer passages are truncated.
    pub max_seq_len: usize,

    pub device: DevicePreference,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            model_dir: None,
            max_seq_len: MAX_SEQ_LEN,
            device: DevicePreference::Auto,
        }
    }
}

impl RerankerConfig {
    pub fn new<P: Into<PathBuf>>(model_dir: P) -> Self {
        Self {
            model_dir: Some(model_dir.into()),
            ..Default::default()
        }
    }

    pub fn stub() -> Self {
        Self::default()
    }

    pub fn is_stub(&self) -> bool {
        self.model_dir.is_none()
    }

    pub fn with_device(mut self, device: DevicePreference) -> Self {
        self.device = device;
        self
    }

    pub fn with_max_seq_len(mut self, max_seq_len: usize) -> Self {
        self.max_seq_len = max_seq_len;
        self
    }

    pub fn validate(&self) -> Result<(), RerankerError> {
        if self.max_seq_len == 0 {
            return Err(RerankerError::InvalidConfig {
                reason: "max_seq_len must be positive".to_string(),
            });
        }
        if self
            .model_dir
            .as_ref()
            .is_some_and(|dir| dir.as_os_str().is_empty())
        {
            return Err(RerankerError::InvalidConfig {
                reason: "model_dir cannot be empty when provided".to_string(),
            });
        }
        Ok(())
    }
}

//! e5-style sentence embedder (BERT encoder + mean pooling).
//!
//! Use [`E5Config::stub`] for tests and local runs without model files.

/// e5 configuration.
pub mod config;


pub use config::{E5_EMBEDDING_DIM, E5_MAX_SEQ_LEN, E5Config};

use std::sync::Arc;

use candle_core::{Device, Tensor};
use tokenizers::{Encoding, Tokenizer};
use tracing::{debug, info, warn};

use crate::constants::validate_embedding_dim;
use crate::embedding::bert::BertEncoder;
use crate::embedding::device::select_device;
use crate::embedding::error::EmbeddingError;
use crate::embedding::utils::load_tokenizer_for_batches;
use crate::embedding::{EmbedRole, TextEmbedder};
use crate::hashing::hash_to_u64;

enum EmbedderBackend {
    Model {
        encoder: BertEncoder,
        tokenizer: Arc<Tokenizer>,
        device: Device,
    },
    Stub,
}

/// Embedding oracle for semantic search (supports stub mode).
pub struct E5Embedder {
    backend: EmbedderBackend,
    config: E5Config,
}

impl std::fmt::Debug for E5Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("E5Embedder")
            .field(
                "backend",
                &match &self.backend {
                    EmbedderBackend::Model { device, .. } => format!("Model({:?})", device),
                    EmbedderBackend::Stub => "Stub".to_string(),
                },
            )
            .field("embedding_dim", &self.config.embedding_dim)
            .field("max_seq_len", &self.config.max_seq_len)
            .finish()
    }
}

impl E5Embedder {
    /// Loads the embedder from a config (stub mode is supported).
    pub fn load(config: E5Config) -> Result<Self, EmbeddingError> {
        config.validate()?;

        let Some(model_dir) = config.model_dir.clone() else {
            warn!("No embedder model directory configured, running in STUB mode");
            return Ok(Self {
                backend: EmbedderBackend::Stub,
                config,
            });
        };

        let device = select_device(config.device)?;
        debug!(?device, "Selected compute device for embedder");

        let encoder =
            BertEncoder::load(&model_dir, &device).map_err(|e| EmbeddingError::ModelLoadFailed {
                reason: format!("Failed to load BERT encoder: {}", e),
            })?;
        validate_embedding_dim(config.embedding_dim, encoder.hidden_size())?;

        let tokenizer = load_tokenizer_for_batches(&model_dir, config.max_seq_len).map_err(|e| {
            EmbeddingError::TokenizationFailed {
                reason: format!("Failed to load tokenizer: {}", e),
            }
        })?;

        info!(
            model_dir = %model_dir.display(),
            embedding_dim = config.embedding_dim,
            max_seq_len = config.max_seq_len,
            "Embedding model loaded"
        );

        Ok(Self {
            backend: EmbedderBackend::Model {
                encoder,
                tokenizer: Arc::new(tokenizer),
                device,
            },
            config,
        })
    }

    /// Shorthand for `E5Embedder::load(E5Config::stub())`.
    pub fn stub() -> Self {
        Self {
            backend: EmbedderBackend::Stub,
            config: E5Config::stub(),
        }
    }

    /// Returns `true` if running in stub mode.
    pub fn is_stub(&self) -> bool {
        matches!(self.backend, EmbedderBackend::Stub)
    }

    pub fn config(&self) -> &E5Config {
        &self.config
    }

    fn embed_with_model(
        &self,
        texts: &[&str],
        role: EmbedRole,
        encoder: &BertEncoder,
        tokenizer: &Tokenizer,
        device: &Device,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let prefixed: Vec<String> = texts
            .iter()
            .map(|t| format!("{}{}", role.prefix(), t))
            .collect();

        let encodings = tokenizer
            .encode_batch(prefixed, true)
            .map_err(|e| EmbeddingError::TokenizationFailed {
                reason: e.to_string(),
            })?;

        let input_ids = stack_field(&encodings, device, Encoding::get_ids)?;
        let type_ids = stack_field(&encodings, device, Encoding::get_type_ids)?;
        let attention_mask = stack_field(&encodings, device, Encoding::get_attention_mask)?;

        debug!(
            batch = texts.len(),
            seq_len = encodings.first().map(|e| e.len()).unwrap_or(0),
            "Running encoder forward pass"
        );

        let pooled = encoder
            .forward(&input_ids, &type_ids, &attention_mask)
            .map_err(|e| EmbeddingError::InferenceFailed {
                reason: format!("Encoder forward pass failed: {}", e),
            })?;

        let rows = pooled.to_vec2::<f32>()?;
        Ok(rows.into_iter().map(l2_normalize).collect())
    }

    /// Hashed character-bigram bag projected onto `embedding_dim` buckets.
    ///
    /// Texts sharing many bigrams land close together, which is enough for
    /// stub-mode retrieval over Japanese text.
    fn embed_stub(&self, text: &str) -> Vec<f32> {
        let dim = self.config.embedding_dim;
        let mut embedding = vec![0.0f32; dim];

        let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
        let mut add = |gram: &[char]| {
            let s: String = gram.iter().collect();
            let h = hash_to_u64(s.as_bytes());
            let bucket = (h % dim as u64) as usize;
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            embedding[bucket] += sign;
        };

        if chars.len() == 1 {
            add(&chars);
        }
        for window in chars.windows(2) {
            add(window);
        }

        l2_normalize(embedding)
    }
}

impl TextEmbedder for E5Embedder {
    fn embed(&self, text: &str, role: EmbedRole) -> Result<Vec<f32>, EmbeddingError> {
        let mut batch = self.embed_batch(&[text], role)?;
        batch.pop().ok_or_else(|| EmbeddingError::InferenceFailed {
            reason: "encoder returned no rows".to_string(),
        })
    }

    fn embed_batch(&self, texts: &[&str], role: EmbedRole) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        match &self.backend {
            EmbedderBackend::Model {
                encoder,
                tokenizer,
                device,
            } => self.embed_with_model(texts, role, encoder, tokenizer, device),
            EmbedderBackend::Stub => Ok(texts.iter().map(|t| self.embed_stub(t)).collect()),
        }
    }

    fn dimension(&self) -> usize {
        self.config.embedding_dim
    }
}

fn stack_field(
    encodings: &[Encoding],
    device: &Device,
    field: fn(&Encoding) -> &[u32],
) -> Result<Tensor, EmbeddingError> {
    let rows = encodings
        .iter()
        .map(|e| Tensor::new(field(e), device))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Tensor::stack(&rows, 0)?)
}

fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

pub mod config;
pub mod error;

#[cfg(test)]
mod tests;

pub use config::{MAX_SEQ_LEN, RerankerConfig};
pub use error::RerankerError;

use std::collections::HashSet;

use candle_core::Tensor;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::embedding::CrossEncoder;
use crate::embedding::bert::BertClassifier;
use crate::embedding::device::select_device;
use crate::embedding::utils::load_tokenizer_with_truncation;

/// Stub scores live on roughly the same scale as real cross-encoder logits.
const STUB_SCORE_FLOOR: f32 = -4.0;
const STUB_SCORE_SPAN: f32 = 10.0;

pub struct Reranker {
    device: candle_core::Device,
    config: RerankerConfig,
    model: Option<BertClassifier>,
    tokenizer: Option<Tokenizer>,
}

impl std::fmt::Debug for Reranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reranker")
            .field("device", &format!("{:?}", self.device))
            .field("config", &self.config)
            .field("model_loaded", &self.is_model_loaded())
            .finish()
    }
}

impl Reranker {
    pub fn load(config: RerankerConfig) -> Result<Self, RerankerError> {
        config.validate()?;

        let Some(model_dir) = config.model_dir.clone() else {
            info!("No reranker model path configured, operating in stub mode");
            return Ok(Self {
                device: candle_core::Device::Cpu,
                config,
                model: None,
                tokenizer: None,
            });
        };

        let device = select_device(config.device)?;
        debug!(?device, "Selected compute device for reranker");

        for required in ["config.json", "model.safetensors", "tokenizer.json"] {
            if !model_dir.join(required).exists() {
                return Err(RerankerError::ModelLoadFailed {
                    reason: format!("Missing {} in {}", required, model_dir.display()),
                });
            }
        }

        info!(model_dir = %model_dir.display(), "Loading reranker model");

        let model = BertClassifier::load(&model_dir, &device).map_err(|e| {
            RerankerError::ModelLoadFailed {
                reason: format!("Failed to load BERT model: {}", e),
            }
        })?;

        let tokenizer =
            load_tokenizer_with_truncation(&model_dir, config.max_seq_len).map_err(|e| {
                RerankerError::ModelLoadFailed {
                    reason: format!("Failed to load tokenizer: {}", e),
                }
            })?;

        info!("Reranker model loaded successfully");

        Ok(Self {
            device,
            config,
            model: Some(model),
            tokenizer: Some(tokenizer),
        })
    }

    pub fn stub() -> Self {
        Self {
            device: candle_core::Device::Cpu,
            config: RerankerConfig::stub(),
            model: None,
            tokenizer: None,
        }
    }

    /// Raw relevance logit for one pair. Unbounded, centred near zero.
    pub fn score(&self, query: &str, passage: &str) -> Result<f32, RerankerError> {
        let (Some(model), Some(tokenizer)) = (&self.model, &self.tokenizer) else {
            return Ok(placeholder_score(query, passage));
        };

        let tokens = tokenizer.encode((query, passage), true).map_err(|e| {
            RerankerError::TokenizationFailed {
                reason: e.to_string(),
            }
        })?;

        let token_ids = Tensor::new(tokens.get_ids(), &self.device)?.unsqueeze(0)?;
        let type_ids = Tensor::new(tokens.get_type_ids(), &self.device)?.unsqueeze(0)?;
        let attention_mask = Tensor::new(tokens.get_attention_mask(), &self.device)?.unsqueeze(0)?;

        let logits = model
            .forward(&token_ids, &type_ids, Some(&attention_mask))
            .map_err(|e| RerankerError::InferenceFailed {
                reason: e.to_string(),
            })?;

        logits
            .flatten_all()?
            .to_vec1::<f32>()?
            .first()
            .copied()
            .ok_or_else(|| RerankerError::InferenceFailed {
                reason: "classifier produced no logits".to_string(),
            })
    }

    pub fn is_model_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn config(&self) -> &RerankerConfig {
        &self.config
    }

    pub fn device(&self) -> &candle_core::Device {
        &self.device
    }
}

impl CrossEncoder for Reranker {
    fn score_batch(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>, RerankerError> {
        debug!(
            query_len = query.len(),
            num_candidates = passages.len(),
            model_loaded = self.is_model_loaded(),
            "Scoring candidates"
        );

        let scores = passages
            .iter()
            .map(|passage| self.score(query, passage))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            top_score = scores.iter().copied().fold(None, |acc: Option<f32>, s| {
                Some(acc.map_or(s, |a| a.max(s)))
            }),
            "Scoring complete"
        );

        Ok(scores)
    }
}

fn char_bigrams(text: &str) -> HashSet<(char, char)> {
    let chars: Vec<char> = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect();
    chars.windows(2).map(|w| (w[0], w[1])).collect()
}

/// Lexical stand-in for the cross-encoder: bigram recall and Jaccard mapped
/// onto `[-4, 6]`.
fn placeholder_score(query: &str, passage: &str) -> f32 {
    let query_grams = char_bigrams(query);
    if query_grams.is_empty() {
        return STUB_SCORE_FLOOR;
    }
    let passage_grams = char_bigrams(passage);

    let matches = query_grams.intersection(&passage_grams).count() as f32;
    let recall = matches / query_grams.len() as f32;
    let union = query_grams.union(&passage_grams).count() as f32;
    let jaccard = if union > 0.0 { matches / union } else { 0.0 };

    STUB_SCORE_FLOOR + STUB_SCORE_SPAN * (0.7 * recall + 0.3 * jaccard)
}

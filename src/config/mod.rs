//! Environment-backed configuration.
//!
//! Every setting has a default. Override with `QUIZRAG_*` environment variables.

pub mod error;
mod quiz;
mod retrieval;

#[cfg(test)]
mod tests;

pub use error::ConfigError;
pub use quiz::QuizConfig;
pub use retrieval::RetrievalConfig;

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::embedding::DevicePreference;

/// Process configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `QUIZRAG_*` overrides on top of defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Qdrant endpoint URL. Default: `http://localhost:6334`.
    pub qdrant_url: String,

    /// Collection holding indexed chunks. Default: `manual_chunks`.
    pub collection: String,

    /// Directory with the embedding model (`config.json`, `model.safetensors`,
    /// `tokenizer.json`). Stub embeddings are used when unset.
    pub embedder_path: Option<PathBuf>,

    /// Directory with the cross-encoder model. Stub scoring is used when unset.
    pub reranker_path: Option<PathBuf>,

    /// Compute device preference for both models. Default: `auto`.
    pub device: DevicePreference,

    /// Model used for grounded answers. Default: `gemini-2.0-flash`.
    pub llm_model: String,

    /// Model used for quiz generation. Default: same as `llm_model`.
    pub llm_quiz_model: String,

    /// Per-call LLM timeout in seconds. Default: `30`.
    pub llm_timeout_secs: u64,

    /// Hybrid retrieval settings.
    pub retrieval: RetrievalConfig,

    /// Sampling retrieval and orchestrator settings.
    pub quiz: QuizConfig,
}

/// Default Qdrant URL used when `QUIZRAG_QDRANT_URL` is not set.
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

/// Default collection name used when `QUIZRAG_COLLECTION` is not set.
pub const DEFAULT_COLLECTION: &str = "manual_chunks";

/// Default chat model used when `QUIZRAG_LLM_MODEL` is not set.
pub const DEFAULT_LLM_MODEL: &str = "gemini-2.0-flash";

impl Default for Config {
    fn default() -> Self {
        Self {
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            embedder_path: None,
            reranker_path: None,
            device: DevicePreference::Auto,
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            llm_quiz_model: DEFAULT_LLM_MODEL.to_string(),
            llm_timeout_secs: 30,
            retrieval: RetrievalConfig::default(),
            quiz: QuizConfig::default(),
        }
    }
}

impl Config {
    const ENV_QDRANT_URL: &'static str = "QUIZRAG_QDRANT_URL";
    const ENV_COLLECTION: &'static str = "QUIZRAG_COLLECTION";
    const ENV_EMBEDDER_PATH: &'static str = "QUIZRAG_EMBEDDER_PATH";
    const ENV_RERANKER_PATH: &'static str = "QUIZRAG_RERANKER_PATH";
    const ENV_DEVICE: &'static str = "QUIZRAG_DEVICE";
    const ENV_LLM_MODEL: &'static str = "QUIZRAG_LLM_MODEL";
    const ENV_LLM_QUIZ_MODEL: &'static str = "QUIZRAG_LLM_QUIZ_MODEL";
    const ENV_LLM_TIMEOUT_SECS: &'static str = "QUIZRAG_LLM_TIMEOUT_SECS";

    const ENV_CANDIDATE_RATIO: &'static str = "QUIZRAG_CANDIDATE_RATIO";
    const ENV_CANDIDATE_MIN_K: &'static str = "QUIZRAG_CANDIDATE_MIN_K";
    const ENV_CANDIDATE_MAX_K: &'static str = "QUIZRAG_CANDIDATE_MAX_K";
    const ENV_RERANK_ENABLED: &'static str = "QUIZRAG_RERANK_ENABLED";
    const ENV_RERANK_RATIO: &'static str = "QUIZRAG_RERANK_RATIO";
    const ENV_RERANK_MIN_N: &'static str = "QUIZRAG_RERANK_MIN_N";
    const ENV_RERANK_MAX_N: &'static str = "QUIZRAG_RERANK_MAX_N";
    const ENV_RERANK_SCORE_THRESHOLD: &'static str = "QUIZRAG_RERANK_SCORE_THRESHOLD";
    const ENV_RERANK_GAP_THRESHOLD: &'static str = "QUIZRAG_RERANK_GAP_THRESHOLD";
    const ENV_RRF_K: &'static str = "QUIZRAG_RRF_K";
    const ENV_TOP_K: &'static str = "QUIZRAG_TOP_K";
    const ENV_KEYWORD_MIN_SCORE: &'static str = "QUIZRAG_KEYWORD_MIN_SCORE";
    const ENV_QUIZ_FALLBACK_TOP_N: &'static str = "QUIZRAG_QUIZ_FALLBACK_TOP_N";

    const ENV_QUIZ_SAMPLE_MULTIPLIER: &'static str = "QUIZRAG_QUIZ_SAMPLE_MULTIPLIER";
    const ENV_QUIZ_SAMPLE_MIN_N: &'static str = "QUIZRAG_QUIZ_SAMPLE_MIN_N";
    const ENV_QUIZ_CITATIONS_MIN: &'static str = "QUIZRAG_QUIZ_CITATIONS_MIN";
    const ENV_QUIZ_POOL_MAX_IDS: &'static str = "QUIZRAG_QUIZ_POOL_MAX_IDS_PER_SOURCE";
    const ENV_QUIZ_POOL_BATCH_SIZE: &'static str = "QUIZRAG_QUIZ_POOL_BATCH_SIZE";
    const ENV_QUIZ_QUOTE_MAX_LEN: &'static str = "QUIZRAG_QUIZ_QUOTE_MAX_LEN";
    const ENV_QUIZ_MAX_ATTEMPTS: &'static str = "QUIZRAG_QUIZ_MAX_ATTEMPTS";
    const ENV_QUIZ_MAX_CONSECUTIVE_DUPLICATES: &'static str =
        "QUIZRAG_QUIZ_MAX_CONSECUTIVE_DUPLICATES";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let llm_model = Self::parse_string_from_env(Self::ENV_LLM_MODEL, defaults.llm_model);
        let llm_quiz_model =
            Self::parse_string_from_env(Self::ENV_LLM_QUIZ_MODEL, llm_model.clone());

        let device = match Self::read_trimmed(Self::ENV_DEVICE) {
            Some(value) => DevicePreference::from_str(&value)
                .map_err(|_| ConfigError::InvalidDevice { value })?,
            None => defaults.device,
        };

        let r = defaults.retrieval;
        let retrieval = RetrievalConfig {
            candidate_ratio: Self::parse_number(Self::ENV_CANDIDATE_RATIO, r.candidate_ratio)?,
            candidate_min_k: Self::parse_number(Self::ENV_CANDIDATE_MIN_K, r.candidate_min_k)?,
            candidate_max_k: Self::parse_number(Self::ENV_CANDIDATE_MAX_K, r.candidate_max_k)?,
            rerank_enabled: Self::parse_bool(Self::ENV_RERANK_ENABLED, r.rerank_enabled)?,
            rerank_ratio: Self::parse_number(Self::ENV_RERANK_RATIO, r.rerank_ratio)?,
            rerank_min_n: Self::parse_number(Self::ENV_RERANK_MIN_N, r.rerank_min_n)?,
            rerank_max_n: Self::parse_number(Self::ENV_RERANK_MAX_N, r.rerank_max_n)?,
            rerank_score_threshold: Self::parse_number(
                Self::ENV_RERANK_SCORE_THRESHOLD,
                r.rerank_score_threshold,
            )?,
            rerank_score_gap_threshold: Self::parse_number(
                Self::ENV_RERANK_GAP_THRESHOLD,
                r.rerank_score_gap_threshold,
            )?,
            rrf_k: Self::parse_number(Self::ENV_RRF_K, r.rrf_k)?,
            top_k: Self::parse_number(Self::ENV_TOP_K, r.top_k)?,
            keyword_min_score: Self::parse_number(Self::ENV_KEYWORD_MIN_SCORE, r.keyword_min_score)?,
            quiz_fallback_top_n: Self::parse_number(
                Self::ENV_QUIZ_FALLBACK_TOP_N,
                r.quiz_fallback_top_n,
            )?,
        };

        let q = defaults.quiz;
        let quiz = QuizConfig {
            sample_multiplier: Self::parse_number(
                Self::ENV_QUIZ_SAMPLE_MULTIPLIER,
                q.sample_multiplier,
            )?,
            sample_min_n: Self::parse_number(Self::ENV_QUIZ_SAMPLE_MIN_N, q.sample_min_n)?,
            citations_min: Self::parse_number(Self::ENV_QUIZ_CITATIONS_MIN, q.citations_min)?,
            pool_max_ids_per_source: Self::parse_number(
                Self::ENV_QUIZ_POOL_MAX_IDS,
                q.pool_max_ids_per_source,
            )?,
            pool_batch_size: Self::parse_number(
                Self::ENV_QUIZ_POOL_BATCH_SIZE,
                q.pool_batch_size,
            )?,
            quote_max_len: Self::parse_number(Self::ENV_QUIZ_QUOTE_MAX_LEN, q.quote_max_len)?,
            max_attempts: Self::parse_number(Self::ENV_QUIZ_MAX_ATTEMPTS, q.max_attempts)?,
            max_consecutive_duplicates: Self::parse_number(
                Self::ENV_QUIZ_MAX_CONSECUTIVE_DUPLICATES,
                q.max_consecutive_duplicates,
            )?,
            ..q
        };

        Ok(Self {
            qdrant_url: Self::parse_string_from_env(Self::ENV_QDRANT_URL, defaults.qdrant_url),
            collection: Self::parse_string_from_env(Self::ENV_COLLECTION, defaults.collection),
            embedder_path: Self::parse_optional_path_from_env(Self::ENV_EMBEDDER_PATH),
            reranker_path: Self::parse_optional_path_from_env(Self::ENV_RERANKER_PATH),
            device,
            llm_model,
            llm_quiz_model,
            llm_timeout_secs: Self::parse_number(
                Self::ENV_LLM_TIMEOUT_SECS,
                defaults.llm_timeout_secs,
            )?,
            retrieval,
            quiz,
        })
    }

    /// Validates paths and numeric invariants (does not touch the network).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.qdrant_url.trim().is_empty() {
            return Err(ConfigError::EmptyValue { name: "qdrant_url" });
        }
        if self.collection.trim().is_empty() {
            return Err(ConfigError::EmptyValue { name: "collection" });
        }
        if self.llm_timeout_secs == 0 {
            return Err(ConfigError::OutOfRange {
                name: "llm_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }

        for path in [&self.embedder_path, &self.reranker_path].into_iter().flatten() {
            if !path.exists() {
                return Err(ConfigError::PathNotFound { path: path.clone() });
            }
            if !path.is_dir() {
                return Err(ConfigError::NotADirectory { path: path.clone() });
            }
        }

        self.retrieval.validate()?;
        self.quiz.validate()
    }

    /// Per-call LLM timeout.
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    /// Wall-clock budget of one generation session (twice the per-call timeout).
    pub fn session_budget(&self) -> Duration {
        self.llm_timeout() * 2
    }

    fn read_trimmed(var_name: &str) -> Option<String> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_optional_path_from_env(var_name: &str) -> Option<PathBuf> {
        Self::read_trimmed(var_name).map(PathBuf::from)
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        Self::read_trimmed(var_name).unwrap_or(default)
    }

    fn parse_number<T: FromStr>(var_name: &'static str, default: T) -> Result<T, ConfigError> {
        match Self::read_trimmed(var_name) {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidNumber {
                name: var_name,
                value,
                expected: std::any::type_name::<T>(),
            }),
            None => Ok(default),
        }
    }

    fn parse_bool(var_name: &'static str, default: bool) -> Result<bool, ConfigError> {
        match Self::read_trimmed(var_name) {
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::InvalidBool {
                    name: var_name,
                    value,
                }),
            },
            None => Ok(default),
        }
    }
}

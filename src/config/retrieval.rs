use super::ConfigError;

/// Tuning knobs for the hybrid retrieval pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalConfig {
    /// Fraction of the indexed chunk count used as candidate pool size. Default: `0.005`.
    pub candidate_ratio: f64,

    /// Lower bound of the candidate pool. Default: `20`.
    pub candidate_min_k: usize,

    /// Upper bound of the candidate pool. Default: `60`.
    pub candidate_max_k: usize,

    /// Whether the cross-encoder stage runs at all. Default: `true`.
    pub rerank_enabled: bool,

    /// Fraction of `candidate_k` sent to the cross-encoder. Default: `0.5`.
    pub rerank_ratio: f64,

    /// Lower bound of the rerank batch. Default: `10`.
    pub rerank_min_n: usize,

    /// Upper bound of the rerank batch. Default: `30`.
    pub rerank_max_n: usize,

    /// Absolute floor on cross-encoder scores. Default: `-3.0`.
    ///
    /// The oracle emits raw logits centred near zero, so the floor is negative.
    pub rerank_score_threshold: f32,

    /// Largest allowed gap between the best score and an accepted score. Default: `6.0`.
    pub rerank_score_gap_threshold: f32,

    /// RRF smoothing constant `K`. Default: `20`.
    pub rrf_k: f64,

    /// Citations returned per query. Default: `5`.
    pub top_k: usize,

    /// Minimum lexical score for a keyword hit. Default: `2`.
    pub keyword_min_score: i64,

    /// Fused entries exposed as quiz candidates when reranking is skipped. Default: `10`.
    pub quiz_fallback_top_n: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            candidate_ratio: 0.005,
            candidate_min_k: 20,
            candidate_max_k: 60,
            rerank_enabled: true,
            rerank_ratio: 0.5,
            rerank_min_n: 10,
            rerank_max_n: 30,
            rerank_score_threshold: -3.0,
            rerank_score_gap_threshold: 6.0,
            rrf_k: 20.0,
            top_k: 5,
            keyword_min_score: 2,
            quiz_fallback_top_n: 10,
        }
    }
}

impl RetrievalConfig {
    /// Checks ratios, bounds and constants for internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.candidate_ratio > 0.0 && self.candidate_ratio <= 1.0) {
            return Err(ConfigError::OutOfRange {
                name: "candidate_ratio",
                reason: format!("must be in (0, 1], got {}", self.candidate_ratio),
            });
        }
        if !(self.rerank_ratio > 0.0 && self.rerank_ratio <= 1.0) {
            return Err(ConfigError::OutOfRange {
                name: "rerank_ratio",
                reason: format!("must be in (0, 1], got {}", self.rerank_ratio),
            });
        }
        if self.candidate_min_k > self.candidate_max_k {
            return Err(ConfigError::InvertedBounds {
                min_name: "candidate_min_k",
                min: self.candidate_min_k,
                max_name: "candidate_max_k",
                max: self.candidate_max_k,
            });
        }
        if self.rerank_min_n > self.rerank_max_n {
            return Err(ConfigError::InvertedBounds {
                min_name: "rerank_min_n",
                min: self.rerank_min_n,
                max_name: "rerank_max_n",
                max: self.rerank_max_n,
            });
        }
        if self.rrf_k <= 0.0 {
            return Err(ConfigError::OutOfRange {
                name: "rrf_k",
                reason: format!("must be positive, got {}", self.rrf_k),
            });
        }
        if self.rerank_score_gap_threshold < 0.0 {
            return Err(ConfigError::OutOfRange {
                name: "rerank_score_gap_threshold",
                reason: format!("must be non-negative, got {}", self.rerank_score_gap_threshold),
            });
        }
        if self.top_k == 0 {
            return Err(ConfigError::OutOfRange {
                name: "top_k",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

use super::ConfigError;

/// Tuning knobs for sampling retrieval and the generation orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizConfig {
    /// Sampled chunk ids per requested item. Default: `6`.
    pub sample_multiplier: usize,

    /// Minimum number of sampled chunk ids. Default: `30`.
    pub sample_min_n: usize,

    /// Citations sampling retrieval tries to reach before giving up. Default: `5`.
    pub citations_min: usize,

    /// Chunk ids kept per source in the pool. Default: `500`.
    pub pool_max_ids_per_source: usize,

    /// Page size used while scrolling the store to build the pool. Default: `500`.
    pub pool_batch_size: usize,

    /// Quote length (chars) of sampled citations. Default: `200`.
    pub quote_max_len: usize,

    /// Base number of orchestrator rounds. Default: `10`.
    pub max_attempts: usize,

    /// Consecutive duplicate rejections that stop a session. Default: `5`.
    pub max_consecutive_duplicates: usize,

    /// Statements remembered and fed back as "do not repeat". Default: `30`.
    pub banned_statements_cap: usize,

    /// Parallel generation calls per round. Default: `5`.
    pub batch_size: usize,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            sample_multiplier: 6,
            sample_min_n: 30,
            citations_min: 5,
            pool_max_ids_per_source: 500,
            pool_batch_size: 500,
            quote_max_len: 200,
            max_attempts: 10,
            max_consecutive_duplicates: 5,
            banned_statements_cap: 30,
            batch_size: 5,
        }
    }
}

impl QuizConfig {
    /// Rejects zero values where a zero would stall sampling or generation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("quiz_sample_multiplier", self.sample_multiplier),
            ("quiz_pool_max_ids_per_source", self.pool_max_ids_per_source),
            ("quiz_pool_batch_size", self.pool_batch_size),
            ("quiz_quote_max_len", self.quote_max_len),
            ("quiz_max_attempts", self.max_attempts),
            ("quiz_max_consecutive_duplicates", self.max_consecutive_duplicates),
            ("quiz_batch_size", self.batch_size),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::OutOfRange {
                    name,
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        Ok(())
    }
}

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::corpus::{Chunk, ChunkKey};

/// Per-side weights applied to reciprocal ranks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub semantic: f64,
    pub keyword: f64,
}

impl FusionWeights {
    pub fn new(semantic: f64, keyword: f64) -> Self {
        Self { semantic, keyword }
    }
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self::new(0.5, 0.5)
    }
}

/// One fused entry. Ranks are 1-based; a side that did not return the chunk
/// holds the sentinel rank `candidate_k + 100`.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedCandidate {
    pub key: ChunkKey,
    pub text: String,
    pub rrf_score: f64,
    pub rank_semantic: usize,
    pub rank_keyword: usize,
}

/// Offset added to `candidate_k` for ranks missing from one side.
pub const MISSING_RANK_OFFSET: usize = 100;

/// Reciprocal Rank Fusion with smoothing constant `k`.
#[derive(Debug, Clone, Copy)]
pub struct RankFusion {
    k: f64,
}

impl RankFusion {
    pub fn new(k: f64) -> Self {
        Self { k }
    }

    pub fn k(&self) -> f64 {
        self.k
    }

    pub fn score(&self, weights: FusionWeights, rank_semantic: usize, rank_keyword: usize) -> f64 {
        weights.semantic / (self.k + rank_semantic as f64)
            + weights.keyword / (self.k + rank_keyword as f64)
    }

    /// Fuses two best-first chunk lists into one ranking, best first.
    ///
    /// Keys keep first-seen order (semantic side, then keyword-only keys) and
    /// the sort is stable, so equal scores stay in that order. Text comes from
    /// the semantic side when it has any.
    pub fn fuse(
        &self,
        semantic: &[Chunk],
        keyword: &[Chunk],
        weights: FusionWeights,
        candidate_k: usize,
    ) -> Vec<FusedCandidate> {
        let missing = candidate_k + MISSING_RANK_OFFSET;

        let mut order: Vec<ChunkKey> = Vec::with_capacity(semantic.len() + keyword.len());
        let mut semantic_ranks: HashMap<ChunkKey, (usize, &str)> = HashMap::new();
        let mut keyword_ranks: HashMap<ChunkKey, (usize, &str)> = HashMap::new();

        for (idx, chunk) in semantic.iter().enumerate() {
            let key = chunk.key();
            if !semantic_ranks.contains_key(&key) {
                semantic_ranks.insert(key.clone(), (idx + 1, chunk.text.as_str()));
                order.push(key);
            }
        }
        for (idx, chunk) in keyword.iter().enumerate() {
            let key = chunk.key();
            if keyword_ranks.contains_key(&key) {
                continue;
            }
            keyword_ranks.insert(key.clone(), (idx + 1, chunk.text.as_str()));
            if !semantic_ranks.contains_key(&key) {
                order.push(key);
            }
        }

        let mut fused: Vec<FusedCandidate> = order
            .into_iter()
            .map(|key| {
                let sem = semantic_ranks.get(&key).copied();
                let kw = keyword_ranks.get(&key).copied();

                let text = match (sem, kw) {
                    (Some((_, text)), _) if !text.is_empty() => text,
                    (_, Some((_, text))) => text,
                    (Some((_, text)), None) => text,
                    (None, None) => "",
                }
                .to_string();

                let rank_semantic = sem.map_or(missing, |(rank, _)| rank);
                let rank_keyword = kw.map_or(missing, |(rank, _)| rank);

                FusedCandidate {
                    rrf_score: self.score(weights, rank_semantic, rank_keyword),
                    key,
                    text,
                    rank_semantic,
                    rank_keyword,
                }
            })
            .collect();

        fused.sort_by(|a, b| b.rrf_score.partial_cmp(&a.rrf_score).unwrap_or(Ordering::Equal));
        fused
    }
}

impl Default for RankFusion {
    fn default() -> Self {
        Self::new(20.0)
    }
}

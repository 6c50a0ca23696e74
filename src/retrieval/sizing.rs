use crate::config::RetrievalConfig;

/// `clamp(round(total * ratio), min, max)` with round-half-to-even.
///
/// `min` wins over `max` when the bounds are inverted.
pub fn scaled_count(total: usize, ratio: f64, min: usize, max: usize) -> usize {
    let scaled = (total as f64 * ratio).round_ties_even();
    let scaled = if scaled.is_finite() && scaled > 0.0 {
        scaled as usize
    } else {
        0
    };
    scaled.min(max).max(min)
}

/// Candidates fetched from each side for a corpus of `collection_count` chunks.
pub fn candidate_k(collection_count: usize, config: &RetrievalConfig) -> usize {
    scaled_count(
        collection_count,
        config.candidate_ratio,
        config.candidate_min_k,
        config.candidate_max_k,
    )
}

/// Fused entries sent to the cross-encoder.
pub fn rerank_n(candidate_k: usize, config: &RetrievalConfig) -> usize {
    scaled_count(
        candidate_k,
        config.rerank_ratio,
        config.rerank_min_n,
        config.rerank_max_n,
    )
}

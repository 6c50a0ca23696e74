use std::collections::BTreeSet;

use serde::Serialize;

use super::fusion::FusedCandidate;
use super::gate::RerankedCandidate;

/// Pipeline counters and ranking tables for one retrieval call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievalDebug {
    pub collection_count: usize,
    pub candidate_k: usize,
    pub rerank_n: usize,
    pub top_k: usize,
    pub semantic_before_filter: usize,
    pub semantic_after_filter: usize,
    pub keyword_before_filter: usize,
    pub keyword_after_filter: usize,
    pub merged_count: usize,
    pub post_rerank_count: usize,
    pub after_threshold_count: usize,
    pub final_citations_count: usize,
    pub semantic_hits_count: usize,
    pub keyword_hits_count: usize,
    pub pre_rerank: Vec<PreRerankEntry>,
    pub post_rerank: Vec<PostRerankEntry>,
    pub final_selected_sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_sources: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_sources_before_unique: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_sources_before_unique: Option<Vec<String>>,
    /// Why nothing was returned; set only when `final_citations_count == 0`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zero_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreRerankEntry {
    pub source: String,
    pub page: Option<u32>,
    pub rrf_score: f64,
    pub rank_sem: usize,
    pub rank_kw: usize,
}

impl From<&FusedCandidate> for PreRerankEntry {
    fn from(c: &FusedCandidate) -> Self {
        Self {
            source: c.key.source.clone(),
            page: c.key.page,
            rrf_score: round4(c.rrf_score),
            rank_sem: c.rank_semantic,
            rank_kw: c.rank_keyword,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRerankEntry {
    pub source: String,
    pub page: Option<u32>,
    pub rerank_score: f64,
    pub rrf_score: f64,
}

impl From<&RerankedCandidate> for PostRerankEntry {
    fn from(r: &RerankedCandidate) -> Self {
        Self {
            source: r.candidate.key.source.clone(),
            page: r.candidate.key.page,
            rerank_score: round4(f64::from(r.rerank_score)),
            rrf_score: round4(r.candidate.rrf_score),
        }
    }
}

pub const ZERO_EMPTY_COLLECTION: &str = "collection_count=0";
pub const ZERO_NO_CANDIDATES: &str = "semantic_after_filter=0 and keyword_after_filter=0";
pub const ZERO_NOT_MERGED: &str = "merged_count=0";
pub const ZERO_NOT_RERANKED: &str = "post_rerank_count=0";
pub const ZERO_THRESHOLD: &str = "all_candidates_removed_by_rerank_threshold";
pub const ZERO_DEDUP: &str = "merged_count>0 but final_citations_count=0 (dedup or other)";

impl RetrievalDebug {
    /// Picks the first applicable cause for an empty result.
    pub fn classify_zero(&self) -> Option<&'static str> {
        if self.final_citations_count > 0 {
            return None;
        }
        let reason = if self.semantic_after_filter == 0 && self.keyword_after_filter == 0 {
            ZERO_NO_CANDIDATES
        } else if self.merged_count == 0 {
            ZERO_NOT_MERGED
        } else if self.post_rerank_count == 0 {
            ZERO_NOT_RERANKED
        } else if self.after_threshold_count == 0 {
            ZERO_THRESHOLD
        } else {
            ZERO_DEDUP
        };
        Some(reason)
    }

    pub(crate) fn finish(mut self) -> Self {
        self.zero_reason = self.classify_zero().map(str::to_string);
        self
    }
}

pub(crate) fn unique_sorted(sources: &[String]) -> Vec<String> {
    sources
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub(crate) fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

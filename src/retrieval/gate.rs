use std::cmp::Ordering;
use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use super::fusion::FusedCandidate;
use crate::config::RetrievalConfig;
use crate::constants::ASK_QUOTE_MAX_CHARS;
use crate::corpus::{Citation, CitationKey, SourceFilter, citation_key, truncate_chars};
use crate::embedding::{CrossEncoder, RerankerError};

/// A fused entry with its cross-encoder score.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankedCandidate {
    pub candidate: FusedCandidate,
    pub rerank_score: f32,
}

/// Ranked passage handed to quiz generation when the ask path is reused.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizCandidate {
    pub source: String,
    pub page: Option<u32>,
    pub chunk_index: u32,
    pub text: String,
    /// `None` when reranking was skipped or failed.
    pub rerank_score: Option<f32>,
    pub rrf_score: f64,
}

impl QuizCandidate {
    fn from_fused(candidate: &FusedCandidate, rerank_score: Option<f32>) -> Self {
        Self {
            source: candidate.key.source.clone(),
            page: candidate.key.page,
            chunk_index: candidate.key.chunk_index,
            text: candidate.text.clone(),
            rerank_score,
            rrf_score: candidate.rrf_score,
        }
    }
}

/// Citations chosen by the gate plus how many entries cleared both thresholds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GateSelection {
    pub citations: Vec<Citation>,
    pub threshold_passed: usize,
}

/// Absolute-floor and relative-gap filter over cross-encoder scores.
#[derive(Debug, Clone)]
pub struct RerankGate {
    score_threshold: f32,
    gap_threshold: f32,
    quote_max_chars: usize,
}

impl RerankGate {
    pub fn new(score_threshold: f32, gap_threshold: f32) -> Self {
        Self {
            score_threshold,
            gap_threshold,
            quote_max_chars: ASK_QUOTE_MAX_CHARS,
        }
    }

    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self::new(config.rerank_score_threshold, config.rerank_score_gap_threshold)
    }

    pub fn with_quote_max_chars(mut self, quote_max_chars: usize) -> Self {
        self.quote_max_chars = quote_max_chars;
        self
    }

    /// Scores `candidates` in one batch and sorts them best first (stable).
    pub fn rerank(
        &self,
        oracle: &dyn CrossEncoder,
        query: &str,
        candidates: &[FusedCandidate],
    ) -> Result<Vec<RerankedCandidate>, RerankerError> {
        if candidates.is_empty() {
            return Ok(vec![]);
        }

        let passages: Vec<&str> = candidates.iter().map(|c| c.text.as_str()).collect();
        let scores = oracle.score_batch(query, &passages)?;
        if scores.len() != candidates.len() {
            return Err(RerankerError::ScoreCountMismatch {
                expected: candidates.len(),
                actual: scores.len(),
            });
        }

        let mut reranked: Vec<RerankedCandidate> = candidates
            .iter()
            .cloned()
            .zip(scores)
            .map(|(candidate, rerank_score)| RerankedCandidate {
                candidate,
                rerank_score,
            })
            .collect();

        reranked.sort_by(|a, b| {
            b.rerank_score
                .partial_cmp(&a.rerank_score)
                .unwrap_or(Ordering::Equal)
        });

        debug!(
            input = candidates.len(),
            top_scores = ?reranked.iter().take(3).map(|r| r.rerank_score).collect::<Vec<_>>(),
            "Cross-encoder rerank complete"
        );

        Ok(reranked)
    }

    /// Walks the first `top_k * 3` reranked entries and keeps those that pass
    /// the source filter, the absolute floor and the gap to the best score.
    pub fn select(
        &self,
        reranked: &[RerankedCandidate],
        top_k: usize,
        filter: Option<&SourceFilter>,
    ) -> GateSelection {
        let Some(top_score) = reranked.first().map(|r| r.rerank_score) else {
            return GateSelection::default();
        };

        let mut selection = GateSelection::default();
        let mut seen: HashSet<CitationKey> = HashSet::new();

        for entry in reranked.iter().take(top_k.saturating_mul(3)) {
            let key = &entry.candidate.key;
            let score = entry.rerank_score;

            if filter.is_some_and(|f| !f.allows(&key.source)) {
                debug!(source = %key.source, "Dropped by source filter after rerank");
                continue;
            }
            if score < self.score_threshold {
                debug!(
                    source = %key.source,
                    score,
                    threshold = self.score_threshold,
                    "Dropped below rerank score floor"
                );
                continue;
            }
            let gap = top_score - score;
            if gap > self.gap_threshold {
                debug!(
                    source = %key.source,
                    top_score,
                    score,
                    gap,
                    gap_threshold = self.gap_threshold,
                    "Dropped by rerank score gap"
                );
                continue;
            }

            selection.threshold_passed += 1;

            if push_unique_citation(
                &mut selection.citations,
                &mut seen,
                &entry.candidate,
                self.quote_max_chars,
            ) && selection.citations.len() >= top_k
            {
                break;
            }
        }

        selection
    }

    /// Citations straight from the fused order, used when reranking is
    /// disabled or the oracle failed.
    pub fn fallback(&self, fused: &[FusedCandidate], top_k: usize) -> Vec<Citation> {
        let mut citations = Vec::new();
        let mut seen: HashSet<CitationKey> = HashSet::new();

        for candidate in fused.iter().take(top_k.saturating_mul(2)) {
            if push_unique_citation(&mut citations, &mut seen, candidate, self.quote_max_chars)
                && citations.len() >= top_k
            {
                break;
            }
        }

        citations
    }
}

/// Appends a citation unless its dedup key was already seen. Returns whether
/// anything was added.
fn push_unique_citation(
    citations: &mut Vec<Citation>,
    seen: &mut HashSet<CitationKey>,
    candidate: &FusedCandidate,
    quote_max_chars: usize,
) -> bool {
    let key = &candidate.key;
    if !seen.insert(citation_key(&key.source, key.page, &candidate.text)) {
        return false;
    }
    citations.push(Citation::new(
        key.source.clone(),
        key.page,
        truncate_chars(&candidate.text, quote_max_chars),
    ));
    true
}

pub(crate) fn quiz_candidates_from_reranked(reranked: &[RerankedCandidate]) -> Vec<QuizCandidate> {
    reranked
        .iter()
        .map(|r| QuizCandidate::from_fused(&r.candidate, Some(r.rerank_score)))
        .collect()
}

pub(crate) fn quiz_candidates_from_fused(fused: &[FusedCandidate], top_n: usize) -> Vec<QuizCandidate> {
    fused
        .iter()
        .take(top_n)
        .map(|c| QuizCandidate::from_fused(c, None))
        .collect()
}

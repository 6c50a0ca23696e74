use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use super::debug::{PostRerankEntry, PreRerankEntry, RetrievalDebug, ZERO_EMPTY_COLLECTION, unique_sorted};
use super::error::RetrievalError;
use super::fusion::{FusionWeights, RankFusion};
use super::gate::{
    QuizCandidate, RerankGate, quiz_candidates_from_fused, quiz_candidates_from_reranked,
};
use super::sizing::{candidate_k, rerank_n};
use crate::config::RetrievalConfig;
use crate::corpus::{Chunk, Citation, SourceFilter};
use crate::embedding::{CrossEncoder, EmbedRole, TextEmbedder};
use crate::search::LexicalSearch;
use crate::vectordb::ChunkStore;

/// Result of one hybrid retrieval call.
#[derive(Debug, Clone, Default)]
pub struct RetrievalOutcome {
    pub citations: Vec<Citation>,
    /// Reranked (or fused, on fallback) passages for quiz generation.
    pub quiz_candidates: Vec<QuizCandidate>,
    pub debug: Option<RetrievalDebug>,
}

/// Candidates from one side, before and after the source filter.
struct SideResult {
    chunks: Vec<Chunk>,
    before_filter: usize,
    sources_before: Vec<String>,
}

impl SideResult {
    fn empty() -> Self {
        Self {
            chunks: vec![],
            before_filter: 0,
            sources_before: vec![],
        }
    }

    fn filtered(all: Vec<Chunk>, filter: Option<&SourceFilter>) -> Self {
        let before_filter = all.len();
        let sources_before = all.iter().map(|c| c.source.clone()).collect();
        let chunks = match filter {
            Some(filter) => all.into_iter().filter(|c| filter.allows(&c.source)).collect(),
            None => all,
        };
        Self {
            chunks,
            before_filter,
            sources_before,
        }
    }
}

/// Semantic + keyword retrieval fused with RRF and gated by a cross-encoder.
pub struct HybridRetriever<S> {
    store: Arc<S>,
    embedder: Arc<dyn TextEmbedder>,
    reranker: Arc<dyn CrossEncoder>,
    lexical: Arc<dyn LexicalSearch>,
    config: RetrievalConfig,
    fusion: RankFusion,
    gate: RerankGate,
}

impl<S> std::fmt::Debug for HybridRetriever<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridRetriever")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S: ChunkStore> HybridRetriever<S> {
    pub fn new(
        store: Arc<S>,
        embedder: Arc<dyn TextEmbedder>,
        reranker: Arc<dyn CrossEncoder>,
        lexical: Arc<dyn LexicalSearch>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            reranker,
            lexical,
            fusion: RankFusion::new(config.rrf_k),
            gate: RerankGate::from_config(&config),
            config,
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Runs the full pipeline. Zero citations is a normal outcome; the debug
    /// record (when requested) says why.
    #[instrument(skip(self, query, source_filter), fields(query_len = query.len(), top_k = top_k))]
    pub async fn retrieve(
        &self,
        query: &str,
        weights: FusionWeights,
        top_k: usize,
        source_filter: Option<&SourceFilter>,
        include_debug: bool,
    ) -> Result<RetrievalOutcome, RetrievalError> {
        let collection_count = self
            .store
            .count()
            .await
            .map_err(RetrievalError::CollectionCount)? as usize;

        if collection_count == 0 {
            warn!("Chunk collection is empty; index the corpus first");
            let debug = include_debug.then(|| RetrievalDebug {
                top_k,
                zero_reason: Some(ZERO_EMPTY_COLLECTION.to_string()),
                ..Default::default()
            });
            return Ok(RetrievalOutcome {
                debug,
                ..Default::default()
            });
        }

        let candidate_k = candidate_k(collection_count, &self.config);
        let rerank_n = rerank_n(candidate_k, &self.config);

        info!(
            collection_count,
            candidate_k, rerank_n, top_k, "Candidate pool sized"
        );

        let semantic = self.semantic_side(query, candidate_k, source_filter).await;
        let keyword = self.keyword_side(query, candidate_k, source_filter);

        let fused = self
            .fusion
            .fuse(&semantic.chunks, &keyword.chunks, weights, candidate_k);

        debug!(
            merged = fused.len(),
            top_rrf = ?fused.iter().take(3).map(|c| c.rrf_score).collect::<Vec<_>>(),
            "RRF fusion complete"
        );

        let rerank_window = &fused[..fused.len().min(rerank_n)];
        let mut post_rerank_count = 0;
        let mut after_threshold_count = 0;
        let mut post_rerank = Vec::new();

        let (citations, quiz_candidates) = if self.config.rerank_enabled && !fused.is_empty() {
            match self.gate.rerank(self.reranker.as_ref(), query, rerank_window) {
                Ok(reranked) => {
                    post_rerank_count = reranked.len();
                    if include_debug {
                        post_rerank = reranked.iter().map(PostRerankEntry::from).collect();
                    }
                    let selection = self.gate.select(&reranked, top_k, source_filter);
                    after_threshold_count = selection.threshold_passed;

                    info!(
                        post_rerank = post_rerank_count,
                        after_threshold = after_threshold_count,
                        final_citations = selection.citations.len(),
                        "Cross-encoder gate applied"
                    );

                    (selection.citations, quiz_candidates_from_reranked(&reranked))
                }
                Err(e) => {
                    error!(error = %e, "Cross-encoder rerank failed; using RRF order");
                    (
                        self.gate.fallback(&fused, top_k),
                        quiz_candidates_from_fused(&fused, self.config.quiz_fallback_top_n),
                    )
                }
            }
        } else {
            debug!("Reranking skipped; using RRF order");
            (
                self.gate.fallback(&fused, top_k),
                quiz_candidates_from_fused(&fused, self.config.quiz_fallback_top_n),
            )
        };

        let debug = include_debug.then(|| {
            let pre_rerank = if self.config.rerank_enabled {
                rerank_window.iter().map(PreRerankEntry::from).collect()
            } else {
                vec![]
            };
            RetrievalDebug {
                collection_count,
                candidate_k,
                rerank_n,
                top_k,
                semantic_before_filter: semantic.before_filter,
                semantic_after_filter: semantic.chunks.len(),
                keyword_before_filter: keyword.before_filter,
                keyword_after_filter: keyword.chunks.len(),
                merged_count: fused.len(),
                post_rerank_count,
                after_threshold_count,
                final_citations_count: citations.len(),
                semantic_hits_count: semantic.chunks.len(),
                keyword_hits_count: keyword.chunks.len(),
                pre_rerank,
                post_rerank,
                final_selected_sources: citations.iter().map(|c| c.source.clone()).collect(),
                allowed_sources: source_filter.map(|f| f.sources().to_vec()),
                semantic_sources_before_unique: source_filter
                    .map(|_| unique_sorted(&semantic.sources_before)),
                keyword_sources_before_unique: source_filter
                    .map(|_| unique_sorted(&keyword.sources_before)),
                zero_reason: None,
            }
            .finish()
        });

        if let Some(reason) = debug.as_ref().and_then(|d| d.zero_reason.as_deref()) {
            info!(zero_reason = reason, "Retrieval returned no citations");
        }

        Ok(RetrievalOutcome {
            citations,
            quiz_candidates,
            debug,
        })
    }

    /// Vector search over the whole collection, filtered afterwards. Any
    /// failure yields an empty side.
    async fn semantic_side(
        &self,
        query: &str,
        candidate_k: usize,
        filter: Option<&SourceFilter>,
    ) -> SideResult {
        let vector = match self.embedder.embed(query, EmbedRole::Query) {
            Ok(vector) => vector,
            Err(e) => {
                warn!(error = %e, "Query embedding failed; semantic side is empty");
                return SideResult::empty();
            }
        };

        match self.store.query(vector, candidate_k, None).await {
            Ok(hits) => {
                let top_scores: Vec<f32> = hits.iter().take(3).map(|h| h.score).collect();
                let side = SideResult::filtered(hits.into_iter().map(|h| h.chunk).collect(), filter);
                debug!(
                    before_filter = side.before_filter,
                    after_filter = side.chunks.len(),
                    top_scores = ?top_scores,
                    "Semantic search complete"
                );
                side
            }
            Err(e) => {
                warn!(error = %e, "Semantic search failed; semantic side is empty");
                SideResult::empty()
            }
        }
    }

    fn keyword_side(&self, query: &str, candidate_k: usize, filter: Option<&SourceFilter>) -> SideResult {
        match self.lexical.search(query, candidate_k, None) {
            Ok(hits) => {
                let top_scores: Vec<i64> = hits.iter().take(3).map(|h| h.score).collect();
                let side = SideResult::filtered(hits.into_iter().map(|h| h.chunk).collect(), filter);
                debug!(
                    before_filter = side.before_filter,
                    after_filter = side.chunks.len(),
                    top_scores = ?top_scores,
                    "Keyword search complete"
                );
                side
            }
            Err(e) => {
                warn!(error = %e, "Keyword search failed; keyword side is empty");
                SideResult::empty()
            }
        }
    }
}

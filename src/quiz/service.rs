use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use super::citation_matcher::CitationMatcher;
use super::error::QuizError;
use super::generator::{AttemptError, GenerationStats, RejectedItem};
use super::model::QuizItem;
use super::orchestrator::{Orchestrator, QuizRequest, TerminationReason};
use super::prompt::build_search_query;
use super::sampling::{SamplingDebug, SamplingRetriever};
use super::store::{JudgeResult, QuizStore};
use crate::corpus::{Citation, SourceFilter};
use crate::retrieval::{FusionWeights, HybridRetriever, RetrievalDebug};
use crate::vectordb::ChunkStore;

/// How the citations of a quiz set were found.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MaterialDebug {
    Sampling(SamplingDebug),
    Search {
        query: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        retrieval: Option<RetrievalDebug>,
    },
    Failed {
        error: String,
    },
}

/// A generated quiz set.
#[derive(Debug, Clone, Serialize)]
pub struct QuizSetResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz_set_id: Option<String>,
    pub quizzes: Vec<QuizItem>,
    pub total_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_info: Option<String>,
    pub termination: TerminationReason,
    pub attempts: usize,
    pub rejected: Vec<RejectedItem>,
    pub attempt_errors: Vec<AttemptError>,
    pub stats: GenerationStats,
    pub material: MaterialDebug,
}

/// One generated quiz saved in the single-quiz store.
#[derive(Debug, Clone, Serialize)]
pub struct SingleQuizResponse {
    pub quiz_id: String,
    pub quiz: QuizItem,
    pub termination: TerminationReason,
    pub material: MaterialDebug,
}

/// Quiz material lookup, generation, citation repair and storage behind one
/// call.
///
/// Material comes from sampling retrieval when a source is given, and from a
/// level-keyword hybrid search otherwise.
pub struct QuizService<S> {
    sampler: SamplingRetriever<S>,
    retriever: Arc<HybridRetriever<S>>,
    matcher: CitationMatcher<S>,
    orchestrator: Orchestrator,
    store: Arc<QuizStore>,
}

impl<S> std::fmt::Debug for QuizService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuizService")
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

impl<S: ChunkStore> QuizService<S> {
    pub fn new(
        sampler: SamplingRetriever<S>,
        retriever: Arc<HybridRetriever<S>>,
        orchestrator: Orchestrator,
        store: Arc<QuizStore>,
    ) -> Self {
        Self {
            sampler,
            matcher: CitationMatcher::new(Arc::clone(&retriever)),
            retriever,
            orchestrator,
            store,
        }
    }

    pub fn store(&self) -> &Arc<QuizStore> {
        &self.store
    }

    /// Generates a quiz set for `request` and saves it.
    #[instrument(skip(self, request), fields(level = %request.level, count = request.target_count))]
    pub async fn generate(&self, request: &QuizRequest) -> QuizSetResponse {
        let (citations, material) = self.material(request).await;
        info!(citations = citations.len(), "Quiz material ready");

        let report = self.orchestrator.run(request, &citations).await;
        let filter = request
            .source
            .as_deref()
            .and_then(|s| SourceFilter::from_sources([s]));

        let mut quizzes = report.items.clone();
        for item in quizzes.iter_mut().filter(|i| i.citations.is_empty()) {
            item.citations = self.matcher.citations_for(&item.statement, filter.as_ref()).await;
        }

        let quiz_set_id = if quizzes.is_empty() {
            None
        } else {
            match self.store.save_set(&quizzes) {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!(error = %e, "Failed to save quiz set");
                    None
                }
            }
        };

        QuizSetResponse {
            quiz_set_id,
            total_count: quizzes.len(),
            error_info: report.error_info(request.target_count).map(str::to_string),
            quizzes,
            termination: report.termination,
            attempts: report.attempts,
            rejected: report.rejected,
            attempt_errors: report.attempt_errors,
            stats: report.stats,
            material,
        }
    }

    /// Generates one true statement, saves it under a random id and returns
    /// it. `None` when no item survived generation.
    #[instrument(skip(self, request), fields(level = %request.level))]
    pub async fn generate_single(&self, request: &QuizRequest) -> Option<SingleQuizResponse> {
        let request = QuizRequest {
            target_count: 1,
            ..request.clone()
        };
        let (citations, material) = self.material(&request).await;
        let report = self.orchestrator.run(&request, &citations).await;
        let Some(quiz) = report.items.into_iter().next() else {
            warn!(termination = %report.termination, "No single quiz generated");
            return None;
        };
        let quiz_id = self.store.save(quiz.clone());
        Some(SingleQuizResponse {
            quiz_id,
            quiz,
            termination: report.termination,
            material,
        })
    }

    /// Judges `answer` against a quiz saved by [`Self::generate_single`].
    pub fn judge(&self, quiz_id: &str, answer: bool) -> Option<JudgeResult> {
        let result = self.store.judge(quiz_id, answer);
        if result.is_none() {
            warn!(quiz_id, "Unknown quiz id");
        }
        result
    }

    async fn material(&self, request: &QuizRequest) -> (Vec<Citation>, MaterialDebug) {
        let sources: Vec<String> = request.source.iter().cloned().collect();
        match self
            .sampler
            .retrieve(&sources, request.level, request.target_count)
            .await
        {
            Ok(outcome) => (outcome.citations, MaterialDebug::Sampling(outcome.debug)),
            Err(QuizError::SourceRequired) => self.search_material(request).await,
            Err(e) => {
                warn!(error = %e, "Sampling retrieval failed");
                (
                    Vec::new(),
                    MaterialDebug::Failed {
                        error: e.to_string(),
                    },
                )
            }
        }
    }

    async fn search_material(&self, request: &QuizRequest) -> (Vec<Citation>, MaterialDebug) {
        let query = build_search_query(request.level, request.topic.as_deref());
        let top_n = self.retriever.config().quiz_fallback_top_n;
        match self
            .retriever
            .retrieve(&query, FusionWeights::default(), top_n, None, true)
            .await
        {
            Ok(outcome) => (
                outcome.citations,
                MaterialDebug::Search {
                    query,
                    retrieval: outcome.debug,
                },
            ),
            Err(e) => {
                warn!(error = %e, "Quiz material search failed");
                (
                    Vec::new(),
                    MaterialDebug::Failed {
                        error: e.to_string(),
                    },
                )
            }
        }
    }
}

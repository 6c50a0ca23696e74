//! Generation orchestrator.
//!
//! One [`GenerationSession`] per request. Each round picks unused citations
//! ([`steps::plan_round`]), asks the LLM for one true statement per citation
//! (all calls of a round run concurrently), folds the results into the
//! session ([`steps::apply_result`]) and checks the circuit breakers
//! ([`steps::after_round`], [`steps::check_budget`]). Rounds never overlap.
//! After the loop the items at positions 4 and 5 are turned into false
//! statements.

pub mod session;
pub mod steps;


pub use session::{GenerationSession, TerminationReason};
pub use steps::{FIXED_FALSE_POSITIONS, RoundPlan};

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::generator::{AttemptError, GenerationRequest, GenerationStats, RejectedItem, generate_quizzes};
use super::model::{Level, QuizItem};
use crate::config::QuizConfig;
use crate::corpus::{Citation, normalize_source};
use crate::llm::ChatClient;

/// What to generate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizRequest {
    pub level: Level,
    pub topic: Option<String>,
    pub target_count: usize,
    /// Single-source constraint; echoed citations from elsewhere are rejected.
    pub source: Option<String>,
}

impl QuizRequest {
    pub fn new(level: Level, target_count: usize) -> Self {
        Self {
            level,
            topic: None,
            target_count,
            source: None,
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Everything a session produced.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub items: Vec<QuizItem>,
    pub rejected: Vec<RejectedItem>,
    pub termination: TerminationReason,
    pub attempts: usize,
    pub attempt_errors: Vec<AttemptError>,
    pub stats: GenerationStats,
    pub elapsed_ms: u64,
}

impl GenerationReport {
    /// `generation_failed` with zero items, `partial_success` below target.
    pub fn error_info(&self, target_count: usize) -> Option<&'static str> {
        if self.items.is_empty() {
            Some("generation_failed")
        } else if self.items.len() < target_count {
            Some("partial_success")
        } else {
            None
        }
    }
}

/// Drives generation sessions against one chat client.
pub struct Orchestrator {
    client: Arc<dyn ChatClient>,
    config: QuizConfig,
    session_budget: Duration,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("session_budget", &self.session_budget)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// `session_budget` is the wall-clock limit of one session, sampled
    /// between rounds.
    pub fn new(client: Arc<dyn ChatClient>, config: QuizConfig, session_budget: Duration) -> Self {
        Self {
            client,
            config,
            session_budget,
        }
    }

    pub fn config(&self) -> &QuizConfig {
        &self.config
    }

    /// Runs one session over `citations`. Never fails: every failure mode
    /// ends in fewer items plus diagnostics.
    #[instrument(
        skip(self, request, citations),
        fields(level = %request.level, target = request.target_count, citations = citations.len())
    )]
    pub async fn run(&self, request: &QuizRequest, citations: &[Citation]) -> GenerationReport {
        let source = request.source.as_deref().map(normalize_source);
        let mut session =
            GenerationSession::new(request.target_count, source, &self.config, self.session_budget);

        let termination = if citations.is_empty() {
            warn!("No citations to generate from");
            TerminationReason::NoCitations
        } else {
            self.run_rounds(&mut session, request, citations).await
        };

        let mut items = std::mem::take(&mut session.accepted);
        let converted = steps::apply_fixed_false_positions(&mut items);

        info!(
            items = items.len(),
            converted,
            attempts = session.attempts,
            rejected = session.rejected.len(),
            termination = %termination,
            "Generation session finished"
        );

        GenerationReport {
            items,
            termination,
            attempts: session.attempts,
            elapsed_ms: session.elapsed().as_millis() as u64,
            rejected: session.rejected,
            attempt_errors: session.attempt_errors,
            stats: session.stats,
        }
    }

    async fn run_rounds(
        &self,
        session: &mut GenerationSession,
        request: &QuizRequest,
        citations: &[Citation],
    ) -> TerminationReason {
        if session.is_complete() {
            return TerminationReason::TargetReached;
        }
        loop {
            if let Some(reason) = steps::check_budget(session) {
                return reason;
            }

            let plan = steps::plan_round(session, citations, self.config.batch_size, &mut rand::thread_rng());
            let selected = match plan {
                RoundPlan::Select(selected) => selected,
                RoundPlan::Stop(reason) => return reason,
            };
            session.attempts += 1;

            let banned = session.banned();
            let calls = join_all(selected.iter().map(|citation| {
                generate_quizzes(
                    self.client.as_ref(),
                    GenerationRequest {
                        level: request.level,
                        count: 1,
                        topic: request.topic.as_deref(),
                        citations: std::slice::from_ref(citation),
                        banned: &banned,
                    },
                )
            }))
            .await;

            let accepted: usize = selected
                .iter()
                .zip(calls)
                .map(|(citation, call)| steps::apply_result(session, citation, call))
                .sum();
            info!(
                round = session.attempts,
                accepted,
                total = session.accepted.len(),
                target = session.target_count,
                "Round finished"
            );

            if let Some(reason) = steps::after_round(session, accepted, self.config.max_consecutive_duplicates) {
                return reason;
            }
        }
    }
}

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::QuizConfig;
use crate::corpus::CitationKey;
use crate::quiz::generator::{AttemptError, GenerationStats, RejectedItem};
use crate::quiz::model::QuizItem;

/// Items per orchestrator round that raise the attempt budget by one.
const ITEMS_PER_EXTRA_ATTEMPT: usize = 5;

/// Extra rounds on top of `target / 5`.
const ATTEMPT_HEADROOM: usize = 2;

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    TargetReached,
    AttemptsExhausted,
    /// Every usable citation has been used and a reset would not help.
    InsufficientCitations,
    ConsecutiveDuplicates,
    Timeout,
    /// The session started without any citation.
    NoCitations,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TargetReached => "target_reached",
            Self::AttemptsExhausted => "attempts_exhausted",
            Self::InsufficientCitations => "insufficient_citations",
            Self::ConsecutiveDuplicates => "consecutive_duplicates",
            Self::Timeout => "timeout",
            Self::NoCitations => "no_citations",
        }
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All mutable state of one generation session.
///
/// The step functions in [`super::steps`] take it by `&mut` and are the only
/// place its counters change.
#[derive(Debug)]
pub struct GenerationSession {
    pub target_count: usize,
    /// NFC-normalized single-source constraint.
    pub source: Option<String>,
    /// Accepted true items, in acceptance order.
    pub accepted: Vec<QuizItem>,
    pub used_citation_keys: HashSet<CitationKey>,
    banned: VecDeque<String>,
    banned_cap: usize,
    pub consecutive_duplicates: usize,
    pub attempts: usize,
    pub max_attempts: usize,
    /// Times `used_citation_keys` was cleared.
    pub citation_resets: usize,
    started: Instant,
    budget: Duration,
    pub rejected: Vec<RejectedItem>,
    pub attempt_errors: Vec<AttemptError>,
    pub stats: GenerationStats,
}

impl GenerationSession {
    pub fn new(target_count: usize, source: Option<String>, config: &QuizConfig, budget: Duration) -> Self {
        Self {
            target_count,
            source,
            accepted: Vec::with_capacity(target_count),
            used_citation_keys: HashSet::new(),
            banned: VecDeque::new(),
            banned_cap: config.banned_statements_cap,
            consecutive_duplicates: 0,
            attempts: 0,
            max_attempts: max_attempts_for(config.max_attempts, target_count),
            citation_resets: 0,
            started: Instant::now(),
            budget,
            rejected: Vec::new(),
            attempt_errors: Vec::new(),
            stats: GenerationStats::default(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.target_count.saturating_sub(self.accepted.len())
    }

    pub fn is_complete(&self) -> bool {
        self.remaining() == 0
    }

    /// The next round is the last one the attempt budget allows.
    pub fn is_final_attempt(&self) -> bool {
        self.attempts + 1 >= self.max_attempts
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn is_timed_out(&self) -> bool {
        self.elapsed() >= self.budget
    }

    /// Statements the LLM is told not to repeat, oldest first.
    pub fn banned(&self) -> Vec<String> {
        self.banned.iter().cloned().collect()
    }

    /// Remembers `statement`, evicting the oldest entry beyond the cap.
    pub fn ban(&mut self, statement: &str) {
        if self.banned_cap == 0 || self.banned.iter().any(|s| s == statement) {
            return;
        }
        if self.banned.len() >= self.banned_cap {
            self.banned.pop_front();
        }
        self.banned.push_back(statement.to_string());
    }

    pub fn clear_banned(&mut self) {
        self.banned.clear();
    }

    pub fn reset_used_citations(&mut self) {
        self.used_citation_keys.clear();
        self.citation_resets += 1;
    }
}

/// `max(base, target / 5 + 2)`.
pub fn max_attempts_for(base: usize, target_count: usize) -> usize {
    base.max(target_count / ITEMS_PER_EXTRA_ATTEMPT + ATTEMPT_HEADROOM)
}

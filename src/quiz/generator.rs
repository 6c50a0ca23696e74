//! One generation call (LLM, parse, at most one JSON repair) and the batch
//! validation that turns its true statements into accepted true/false pairs.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::error::{GenerationError, ParseError};
use super::model::{FalseSource, Level, QuizItem};
use super::mutator::falsify_with_fallback;
use super::parser::{parse_quiz_output, raw_excerpt};
use super::postprocess::postprocess_item;
use super::prompt::{PromptStats, quiz_generation_messages, quiz_json_fix_messages};
use super::validator::{contains_negative_phrase, validate_item};
use crate::corpus::{Citation, truncate_chars};
use crate::llm::{ChatClient, ChatMode};

/// Characters of a rejected statement kept in diagnostics.
const REJECTED_PREVIEW_CHARS: usize = 100;

/// Stage of a generation call an [`AttemptError`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStage {
    Llm,
    Parse,
    ParseFix,
    Generation,
}

/// Diagnostic record of one failed (or repaired) step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptError {
    pub attempt: usize,
    pub stage: AttemptStage,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t_llm_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t_parse_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_excerpt: Option<String>,
}

impl AttemptError {
    fn new(attempt: usize, stage: AttemptStage, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            attempt,
            stage,
            kind: kind.into(),
            message: message.into(),
            t_llm_ms: None,
            t_parse_ms: None,
            raw_excerpt: None,
        }
    }

    fn parse_failure(attempt: usize, stage: AttemptStage, err: &ParseError, timings: Timings, raw: &str) -> Self {
        Self {
            t_llm_ms: Some(timings.llm_ms),
            t_parse_ms: Some(timings.parse_ms),
            raw_excerpt: Some(raw_excerpt(raw)),
            ..Self::new(attempt, stage, err.kind.as_str(), err.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Timings {
    llm_ms: f64,
    parse_ms: f64,
}

fn elapsed_ms(start: Instant) -> f64 {
    (start.elapsed().as_secs_f64() * 10_000.0).round() / 10.0
}

/// Inputs of one generation call.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub level: Level,
    pub count: usize,
    pub topic: Option<&'a str>,
    pub citations: &'a [Citation],
    /// Earlier statements the model is asked not to repeat.
    pub banned: &'a [String],
}

/// Outcome of one generation call.
#[derive(Debug, Clone)]
pub struct GenerationCall {
    pub items: Result<Vec<QuizItem>, GenerationError>,
    pub attempt_errors: Vec<AttemptError>,
    pub prompt_stats: PromptStats,
}

/// Asks the LLM for `request.count` true statements and parses the reply.
///
/// Unparseable output gets exactly one repair round-trip, except when the
/// list decoded but no item survived (the model already produced valid JSON).
pub async fn generate_quizzes(client: &dyn ChatClient, request: GenerationRequest<'_>) -> GenerationCall {
    let (messages, mut prompt_stats) = quiz_generation_messages(
        request.level,
        request.count,
        request.topic,
        request.citations,
        request.banned,
    );
    let mut attempt_errors = Vec::new();

    let llm_start = Instant::now();
    let raw = match client.chat(&messages, ChatMode::Quiz).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "Quiz generation call failed");
            attempt_errors.push(AttemptError::new(1, AttemptStage::Llm, e.kind(), e.to_string()));
            return GenerationCall {
                items: Err(e.into()),
                attempt_errors,
                prompt_stats,
            };
        }
    };
    let llm_ms = elapsed_ms(llm_start);
    prompt_stats.record_output(&raw);

    let parse_start = Instant::now();
    let parsed = parse_quiz_output(&raw, request.citations, request.count);
    let timings = Timings {
        llm_ms,
        parse_ms: elapsed_ms(parse_start),
    };

    let err = match parsed {
        Ok(items) => {
            debug!(items = items.len(), t_llm_ms = llm_ms, "Quiz output parsed");
            return GenerationCall {
                items: Ok(items),
                attempt_errors,
                prompt_stats,
            };
        }
        Err(err) => err,
    };

    warn!(error = %err, excerpt = %raw_excerpt(&raw), "Quiz output could not be parsed");
    attempt_errors.push(AttemptError::parse_failure(1, AttemptStage::Parse, &err, timings, &raw));

    if !err.kind.is_repairable() {
        return GenerationCall {
            items: Err(GenerationError::ParseFailed {
                reason: err.to_string(),
            }),
            attempt_errors,
            prompt_stats,
        };
    }

    let fix_messages = quiz_json_fix_messages(
        request.level,
        request.count,
        request.topic,
        request.citations,
        &err.to_string(),
    );

    let llm_start = Instant::now();
    let fixed_raw = match client.chat(&fix_messages, ChatMode::Quiz).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "JSON repair call failed");
            attempt_errors.push(AttemptError::new(
                2,
                AttemptStage::ParseFix,
                "llm_error",
                e.to_string(),
            ));
            return GenerationCall {
                items: Err(e.into()),
                attempt_errors,
                prompt_stats,
            };
        }
    };
    let llm_ms = elapsed_ms(llm_start);
    prompt_stats.record_output(&fixed_raw);

    let parse_start = Instant::now();
    let reparsed = parse_quiz_output(&fixed_raw, request.citations, request.count);
    let timings = Timings {
        llm_ms,
        parse_ms: elapsed_ms(parse_start),
    };

    match reparsed {
        Ok(items) => {
            info!(items = items.len(), "JSON repair succeeded");
            attempt_errors.push(AttemptError {
                t_llm_ms: Some(timings.llm_ms),
                t_parse_ms: Some(timings.parse_ms),
                ..AttemptError::new(
                    2,
                    AttemptStage::ParseFix,
                    "success",
                    format!("JSON修復成功: {}件生成", items.len()),
                )
            });
            GenerationCall {
                items: Ok(items),
                attempt_errors,
                prompt_stats,
            }
        }
        Err(fix_err) => {
            warn!(error = %fix_err, "JSON repair output could not be parsed");
            attempt_errors.push(AttemptError::parse_failure(
                2,
                AttemptStage::ParseFix,
                &fix_err,
                timings,
                &fixed_raw,
            ));
            GenerationCall {
                items: Err(GenerationError::JsonFixFailed {
                    reason: fix_err.to_string(),
                }),
                attempt_errors,
                prompt_stats,
            }
        }
    }
}

/// A dropped statement and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedItem {
    pub statement: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub false_source: Option<FalseSource>,
}

impl RejectedItem {
    pub fn new(statement: &str, reason: impl Into<String>) -> Self {
        Self {
            statement: truncate_chars(statement, REJECTED_PREVIEW_CHARS).to_string(),
            reason: reason.into(),
            false_source: None,
        }
    }
}

/// Counts by origin of false statements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FalseSourceStats {
    pub mutator: usize,
    pub fallback: usize,
    pub none: usize,
}

impl FalseSourceStats {
    fn record(&mut self, source: FalseSource) {
        match source {
            FalseSource::Mutator => self.mutator += 1,
            FalseSource::Fallback => self.fallback += 1,
            FalseSource::None => self.none += 1,
        }
    }
}

/// First successful mutation of a batch, kept as a sample for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationSample {
    pub original: String,
    pub mutated: String,
    pub source: FalseSource,
}

/// Aggregate counters of batch validation, summed across calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationStats {
    pub generated_true_count: usize,
    pub generated_false_count: usize,
    pub dropped_reasons: BTreeMap<String, usize>,
    pub llm_negative_rejected_count: usize,
    pub mutator_false_generated_count: usize,
    pub fallback_false_generated_count: usize,
    pub false_source_stats: FalseSourceStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_mutation_log: Option<MutationSample>,
}

impl GenerationStats {
    pub fn record_drop(&mut self, reason: &str) {
        *self.dropped_reasons.entry(reason.to_string()).or_default() += 1;
    }

    /// Adds `other` into `self`. The first mutation sample wins.
    pub fn merge(&mut self, other: &GenerationStats) {
        self.generated_true_count += other.generated_true_count;
        self.generated_false_count += other.generated_false_count;
        for (reason, n) in &other.dropped_reasons {
            *self.dropped_reasons.entry(reason.clone()).or_default() += n;
        }
        self.llm_negative_rejected_count += other.llm_negative_rejected_count;
        self.mutator_false_generated_count += other.mutator_false_generated_count;
        self.fallback_false_generated_count += other.fallback_false_generated_count;
        self.false_source_stats.mutator += other.false_source_stats.mutator;
        self.false_source_stats.fallback += other.false_source_stats.fallback;
        self.false_source_stats.none += other.false_source_stats.none;
        if self.sample_mutation_log.is_none() {
            self.sample_mutation_log = other.sample_mutation_log.clone();
        }
    }
}

/// An accepted true item and its false counterpart, when one was built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedPair {
    pub true_item: QuizItem,
    pub false_item: Option<QuizItem>,
}

/// Result of [`validate_and_process`].
#[derive(Debug, Clone, Default)]
pub struct ValidationBatch {
    pub pairs: Vec<AcceptedPair>,
    pub rejected: Vec<RejectedItem>,
    pub stats: GenerationStats,
}

impl ValidationBatch {
    /// True and false items interleaved (`t1, f1, t2, f2, ...`).
    pub fn accepted(&self) -> Vec<QuizItem> {
        self.pairs
            .iter()
            .flat_map(|p| std::iter::once(&p.true_item).chain(p.false_item.as_ref()))
            .cloned()
            .collect()
    }
}

/// Validates the LLM's true statements and derives a false counterpart for
/// each through the mutator cascade.
pub fn validate_and_process(items: Vec<QuizItem>) -> ValidationBatch {
    let mut batch = ValidationBatch::default();

    for item in items {
        let mut item = postprocess_item(item);
        item.answer_bool = true;

        if contains_negative_phrase(&item.statement) {
            debug!(statement = %item.statement, "True statement is phrased negatively");
            batch.stats.llm_negative_rejected_count += 1;
            batch.stats.record_drop("llm_negative_phrase");
            batch
                .rejected
                .push(RejectedItem::new(&item.statement, "llm_negative_phrase"));
            continue;
        }

        if let Err(reason) = validate_item(&item) {
            let reason = format!("true:{reason}");
            batch.stats.record_drop(&reason);
            batch.rejected.push(RejectedItem::new(&item.statement, reason));
            continue;
        }

        let (false_statement, source) = falsify_with_fallback(&item.statement);

        batch.stats.generated_true_count += 1;

        if source == FalseSource::None || false_statement == item.statement {
            batch.stats.false_source_stats.record(FalseSource::None);
            batch.stats.record_drop("false_generation_failed");
            batch.rejected.push(RejectedItem {
                false_source: Some(FalseSource::None),
                ..RejectedItem::new(&item.statement, "false_generation_failed")
            });
            batch.pairs.push(AcceptedPair {
                true_item: item,
                false_item: None,
            });
            continue;
        }

        let false_item = QuizItem {
            explanation: format!(
                "この文は誤りです。正しくは「{}」です。{}",
                item.statement, item.explanation
            ),
            ..item.to_false(false_statement)
        };
        if let Err(reason) = validate_item(&false_item) {
            let reason = format!("false:{reason}");
            batch.stats.record_drop(&reason);
            batch.rejected.push(RejectedItem {
                false_source: Some(source),
                ..RejectedItem::new(&false_item.statement, reason)
            });
            batch.pairs.push(AcceptedPair {
                true_item: item,
                false_item: None,
            });
            continue;
        }

        match source {
            FalseSource::Mutator => batch.stats.mutator_false_generated_count += 1,
            FalseSource::Fallback => batch.stats.fallback_false_generated_count += 1,
            FalseSource::None => {}
        }
        batch.stats.false_source_stats.record(source);
        if batch.stats.sample_mutation_log.is_none() {
            batch.stats.sample_mutation_log = Some(MutationSample {
                original: item.statement.clone(),
                mutated: false_item.statement.clone(),
                source,
            });
        }
        batch.stats.generated_false_count += 1;
        batch.pairs.push(AcceptedPair {
            true_item: item,
            false_item: Some(false_item),
        });
    }

    batch
}

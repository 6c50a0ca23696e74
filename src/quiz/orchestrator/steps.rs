//! Pure transitions of a [`GenerationSession`].

use std::collections::HashSet;

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use super::session::{GenerationSession, TerminationReason};
use crate::corpus::{Citation, normalize_source};
use crate::quiz::duplicate::{is_citation_used, is_duplicate_statement};
use crate::quiz::generator::{GenerationCall, RejectedItem, validate_and_process};
use crate::quiz::model::QuizItem;
use crate::quiz::mutator::{LAST_RESORT_PREFIX, mutate};

/// Positions (0-based) that always hold false items in the final set.
pub const FIXED_FALSE_POSITIONS: [usize; 2] = [3, 4];

/// Consecutive duplicates with no progress that clear the banned list and
/// used citations.
pub const DIVERSITY_RESET_DUPLICATES: usize = 3;

/// What the next round does.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundPlan {
    /// Generate one item from each of these citations.
    Select(Vec<Citation>),
    Stop(TerminationReason),
}

/// Stops the loop when the attempt budget or the wall-clock budget is spent.
pub fn check_budget(session: &GenerationSession) -> Option<TerminationReason> {
    if session.attempts >= session.max_attempts {
        return Some(TerminationReason::AttemptsExhausted);
    }
    if session.is_timed_out() {
        warn!(elapsed_ms = session.elapsed().as_millis() as u64, "Generation session timed out");
        return Some(TerminationReason::Timeout);
    }
    None
}

/// Picks up to `min(batch_size, remaining, available)` unused citations.
///
/// When fewer unused citations remain than items are missing, the used set
/// is cleared only if the full set covers the remaining target, and never on
/// the last attempt. With nothing left to pick the session stops.
pub fn plan_round<R: Rng + ?Sized>(
    session: &mut GenerationSession,
    citations: &[Citation],
    batch_size: usize,
    rng: &mut R,
) -> RoundPlan {
    let mut seen = HashSet::new();
    let unique: Vec<&Citation> = citations.iter().filter(|c| seen.insert(c.key())).collect();
    if unique.is_empty() {
        return RoundPlan::Stop(TerminationReason::NoCitations);
    }

    let remaining = session.remaining();
    let mut available: Vec<&Citation> = unique
        .iter()
        .copied()
        .filter(|c| !is_citation_used(std::slice::from_ref(*c), &session.used_citation_keys))
        .collect();

    if available.len() < remaining && unique.len() >= remaining && !session.is_final_attempt() {
        info!(
            available = available.len(),
            unique = unique.len(),
            remaining,
            "Not enough unused citations, resetting used set"
        );
        session.reset_used_citations();
        available = unique;
    }

    if available.is_empty() {
        warn!(remaining, "No unused citation left");
        return RoundPlan::Stop(TerminationReason::InsufficientCitations);
    }

    let n = batch_size.min(remaining).min(available.len());
    let selected: Vec<Citation> = available.choose_multiple(rng, n).map(|c| (*c).clone()).collect();
    debug!(selected = selected.len(), available = available.len(), remaining, "Round planned");
    RoundPlan::Select(selected)
}

/// Folds one generation call (made from `citation`) into the session and
/// returns the number of items accepted from it.
pub fn apply_result(session: &mut GenerationSession, citation: &Citation, call: GenerationCall) -> usize {
    session.attempt_errors.extend(call.attempt_errors);

    let items = match call.items {
        Ok(items) => items,
        Err(e) => {
            warn!(error = %e, source = %citation.source, "Generation call failed");
            session.stats.record_drop(&format!("generation_error:{}", e.kind()));
            return 0;
        }
    };

    let batch = validate_and_process(items);
    session.rejected.extend(batch.rejected);
    session.stats.merge(&batch.stats);

    let mut accepted = 0;
    for pair in batch.pairs {
        if session.is_complete() {
            break;
        }
        let mut true_item = pair.true_item;

        if let Some(expected) = &session.source
            && let Some(other) = true_item
                .citations
                .iter()
                .find(|c| normalize_source(&c.source) != *expected)
        {
            warn!(source = %other.source, expected = %expected, "Echoed citation from another source");
            session.stats.record_drop("source_mismatch");
            session
                .rejected
                .push(RejectedItem::new(&true_item.statement, "source_mismatch"));
            continue;
        }

        if is_duplicate_statement(&true_item.statement, &accepted_statements(session)) {
            session.stats.record_drop("duplicate_statement");
            session
                .rejected
                .push(RejectedItem::new(&true_item.statement, "duplicate_statement"));
            session.ban(&true_item.statement);
            session.consecutive_duplicates += 1;
            debug!(
                consecutive = session.consecutive_duplicates,
                "Duplicate statement rejected"
            );
            continue;
        }

        true_item.citations = vec![citation.clone()];
        session.used_citation_keys.insert(citation.key());
        session.ban(&true_item.statement);
        session.consecutive_duplicates = 0;
        session.accepted.push(true_item);
        accepted += 1;
    }
    accepted
}

/// Circuit breakers checked after every round.
pub fn after_round(
    session: &mut GenerationSession,
    accepted_this_round: usize,
    max_consecutive_duplicates: usize,
) -> Option<TerminationReason> {
    if session.is_complete() {
        return Some(TerminationReason::TargetReached);
    }
    if session.consecutive_duplicates >= max_consecutive_duplicates {
        warn!(
            consecutive = session.consecutive_duplicates,
            "Too many consecutive duplicates"
        );
        return Some(TerminationReason::ConsecutiveDuplicates);
    }
    if session.consecutive_duplicates >= DIVERSITY_RESET_DUPLICATES && accepted_this_round == 0 {
        info!(
            consecutive = session.consecutive_duplicates,
            "No progress on duplicates, clearing banned list and used citations"
        );
        session.clear_banned();
        session.reset_used_citations();
    }
    None
}

/// Turns the true items at [`FIXED_FALSE_POSITIONS`] into false ones by
/// mutating their statements. A mutation that collides with the original or
/// another item gets the last-resort prefix instead. Returns how many items
/// were converted.
pub fn apply_fixed_false_positions(items: &mut [QuizItem]) -> usize {
    let mut converted = 0;
    for pos in FIXED_FALSE_POSITIONS {
        let Some(original) = items.get(pos).filter(|item| item.answer_bool).cloned() else {
            continue;
        };
        let others: Vec<String> = items
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != pos)
            .map(|(_, item)| item.statement.clone())
            .collect();
        let collides = |s: &str| s == original.statement || others.iter().any(|o| o == s);

        let candidate = mutate(&original.statement);
        let statement = if collides(candidate.as_str()) {
            format!("{LAST_RESORT_PREFIX}{}", original.statement)
        } else {
            candidate
        };

        debug!(pos, statement = %statement, "Converted fixed position to false");
        items[pos] = QuizItem {
            explanation: format!(
                "この文は誤りです。正しくは「{}」です。{}",
                original.statement, original.explanation
            ),
            ..original.to_false(statement)
        };
        converted += 1;
    }
    converted
}

fn accepted_statements(session: &GenerationSession) -> Vec<String> {
    session.accepted.iter().map(|i| i.statement.clone()).collect()
}

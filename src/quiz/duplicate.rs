//! Statement and citation duplicate detection.
//!
//! Two statements are duplicates when they match after normalization, or when
//! their negation-insensitive core keys match. The core key deliberately
//! treats "X する" and "X しない" as the same fact: once a fact has been asked
//! in either polarity it is not asked again.

use std::collections::HashSet;

use tracing::debug;

use crate::corpus::{Citation, CitationKey};

/// Negated forms rewritten to their affirmative before comparison.
const NEGATION_TO_AFFIRMATIVE: &[(&str, &str)] = &[
    ("行わない", "行う"),
    ("しない", "する"),
    ("ではない", "である"),
];

/// Negation morphemes removed from the core key.
const NEGATION_MORPHEMES: &[&str] = &[
    "なくてもよい",
    "禁止",
    "不要",
    "してはいけない",
    "行ってはいけない",
    "してはならない",
    "行ってはならない",
];

const IGNORED_PUNCTUATION: &[char] = &['。', '、', '.', ','];

/// Removes whitespace and `。、.,`, then lowercases.
pub fn normalize_statement(statement: &str) -> String {
    statement
        .chars()
        .filter(|c| !c.is_whitespace() && !IGNORED_PUNCTUATION.contains(c))
        .collect::<String>()
        .to_lowercase()
}

/// Normalized statement with negation folded away.
pub fn core_content_key(statement: &str) -> String {
    let mut core = statement.to_string();
    for (negated, affirmative) in NEGATION_TO_AFFIRMATIVE {
        core = core.replace(negated, affirmative);
    }
    for morpheme in NEGATION_MORPHEMES {
        core = core.replace(morpheme, "");
    }
    normalize_statement(&core)
}

/// Whether `candidate` repeats any of `existing`, exactly (after
/// normalization) or by core content. An empty core key never matches.
pub fn is_duplicate_statement<S: AsRef<str>>(candidate: &str, existing: &[S]) -> bool {
    let normalized = normalize_statement(candidate);
    if existing
        .iter()
        .any(|e| normalize_statement(e.as_ref()) == normalized)
    {
        debug!(statement = candidate, "Duplicate statement (exact)");
        return true;
    }

    let core = core_content_key(candidate);
    if core.is_empty() {
        return false;
    }
    if existing.iter().any(|e| core_content_key(e.as_ref()) == core) {
        debug!(statement = candidate, "Duplicate statement (core content)");
        return true;
    }
    false
}

/// Whether any of `citations` has already been used.
pub fn is_citation_used(citations: &[Citation], used: &HashSet<CitationKey>) -> bool {
    citations.iter().any(|c| used.contains(&c.key()))
}

//! Turns an affirmed statement into a falsified counterpart.
//!
//! Three layers, each tried only when the previous one left the text
//! unchanged:
//! 1. [`apply_rules`]: ordered substitution rules (numbers, prohibition and
//!    permission, mandatory and optional, order, quantifiers, actions), first
//!    match wins, one substitution, then sentence-ending rewrites.
//! 2. [`falsify_with_fallback`]: verb negation at the sentence end and the
//!    `必ず`/`必須`/`必要` flips.
//! 3. [`mutate`]: prefixes `誤り：` so the output always differs.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{debug, info, warn};

use super::model::FalseSource;

/// Prefix used when nothing else changes the statement.
pub const LAST_RESORT_PREFIX: &str = "誤り：";

const COUNTER_SUFFIXES: &[&str] = &["個", "件", "回", "日", "時間", "分", "秒", "人", "円"];

static COUNTER_RULES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    COUNTER_SUFFIXES
        .iter()
        .filter_map(|suffix| Regex::new(&format!(r"(\d+){suffix}")).ok())
        .collect()
});

/// Literal substitutions after the numeric rules, in priority order.
const SWAP_RULES: &[(&str, &str)] = &[
    // prohibition -> permission
    ("禁止されている", "許可されている"),
    ("禁止である", "許可される"),
    ("禁止する", "許可する"),
    ("してはいけない", "してもよい"),
    ("してはならない", "してもよい"),
    ("行ってはいけない", "行ってもよい"),
    ("行ってはならない", "行ってもよい"),
    // mandatory -> optional
    ("必ず行う", "行わなくてもよい"),
    ("必ず確認する", "確認しなくてもよい"),
    ("必ず連絡する", "連絡しなくてもよい"),
    ("必ず報告する", "報告しなくてもよい"),
    ("必ず持つ", "持たなくてもよい"),
    ("必ず携帯する", "携帯しなくてもよい"),
    ("必ず所持する", "所持しなくてもよい"),
    ("必須である", "任意である"),
    ("必要である", "不要である"),
    ("必要がある", "必要がない"),
    // order
    ("最初に", "最後に"),
    ("第一に", "第二に"),
    ("先に", "後に"),
    ("前に", "後に"),
    // quantifiers and timing
    ("すべて", "一部"),
    ("常に", "時には"),
    ("すぐに", "後で"),
    ("直ちに", "後で"),
    ("即座に", "後で"),
    // actions are postponed rather than negated
    ("確認する", "確認を後回しにする"),
    ("連絡する", "連絡を後回しにする"),
    ("報告する", "報告を後回しにする"),
    ("対応する", "対応を後回しにする"),
    ("対処する", "対処を後回しにする"),
    ("実施する", "実施を後回しにする"),
    ("実行する", "実行を後回しにする"),
    ("処理する", "処理を後回しにする"),
    ("行う", "後回しにする"),
    // scope
    ("全員", "一部"),
    ("すべての", "一部の"),
    ("全ての", "一部の"),
    // adjectives and nouns
    ("重要である", "重要でない"),
    ("適切である", "不適切である"),
    ("正しい", "誤り"),
    ("正確である", "不正確である"),
    ("有効である", "無効である"),
    ("可能である", "不可能である"),
];

/// Sentence endings rewritten when no substitution rule matched. The first
/// matching ending decides; `する。` is handled separately.
const POSTPONE_ENDINGS: &[(&str, &str)] = &[
    ("確認する。", "確認を後回しにする。"),
    ("連絡する。", "連絡を後回しにする。"),
    ("報告する。", "報告を後回しにする。"),
    ("実施する。", "実施を後回しにする。"),
    ("実行する。", "実行を後回しにする。"),
    ("処理する。", "処理を後回しにする。"),
    ("対応する。", "対応を後回しにする。"),
    ("対処する。", "対処を後回しにする。"),
    ("行う。", "後回しにする。"),
];

const NEGATED_ENDINGS: &[(&str, &str)] = &[
    ("できる。", "できない。"),
    ("される。", "されない。"),
    ("である。", "ではない。"),
    ("ある。", "ない。"),
];

/// Sentence-end negations tried by the fallback cascade, in order.
const FALLBACK_ENDINGS: &[(&str, &str)] = &[
    ("行う。", "行わない。"),
    ("確認する。", "確認しない。"),
    ("連絡する。", "連絡しない。"),
    ("報告する。", "報告しない。"),
    ("実施する。", "実施しない。"),
    ("実行する。", "実行しない。"),
    ("処理する。", "処理しない。"),
    ("対応する。", "対応しない。"),
    ("対処する。", "対処しない。"),
    ("示す。", "示さない。"),
    ("持つ。", "持たない。"),
    ("着用する。", "着用しない。"),
    ("である。", "ではない。"),
    ("する。", "しない。"),
    ("できる。", "できない。"),
    ("される。", "されない。"),
    ("ある。", "ない。"),
];

fn replace_suffix(statement: &str, suffix: &str, replacement: &str) -> Option<String> {
    statement
        .strip_suffix(suffix)
        .map(|head| format!("{head}{replacement}"))
}

fn increment_counter(statement: &str) -> Option<String> {
    for rule in COUNTER_RULES.iter() {
        let Some(caps) = rule.captures(statement) else {
            continue;
        };
        // Skip numbers too large to increment.
        let Some(next) = caps[1].parse::<u64>().ok().and_then(|n| n.checked_add(1)) else {
            continue;
        };
        let mutated = rule
            .replacen(statement, 1, |c: &Captures<'_>| {
                let whole = &c[0];
                format!("{next}{}", &whole[c[1].len()..])
            })
            .into_owned();
        if mutated != statement {
            return Some(mutated);
        }
    }
    None
}

fn rewrite_ending(statement: &str) -> Option<String> {
    for (suffix, replacement) in POSTPONE_ENDINGS {
        if statement.ends_with(suffix) {
            return replace_suffix(statement, suffix, replacement);
        }
    }
    if let Some(verb) = statement.strip_suffix("する。") {
        return (!verb.is_empty()).then(|| format!("{verb}を後回しにする。"));
    }
    for (suffix, replacement) in NEGATED_ENDINGS {
        if statement.ends_with(suffix) {
            return replace_suffix(statement, suffix, replacement);
        }
    }
    flip_mandatory(statement)
}

/// `必ず` is dropped, `必須` becomes `任意`, `必要` becomes `不要`; the first
/// present word decides.
fn flip_mandatory(statement: &str) -> Option<String> {
    let mutated = if statement.contains("必ず") {
        statement.replace("必ず", "").replace("  ", " ").trim().to_string()
    } else if statement.contains("必須") {
        statement.replace("必須", "任意")
    } else if statement.contains("必要") {
        statement.replace("必要", "不要")
    } else {
        return None;
    };
    (mutated != statement).then_some(mutated)
}

/// Applies the first matching rule. Returns `None` when no rule changes the
/// statement.
pub fn apply_rules(statement: &str) -> Option<String> {
    if let Some(mutated) = increment_counter(statement) {
        debug!("Mutated by counter increment");
        return Some(mutated);
    }

    for (pattern, replacement) in SWAP_RULES {
        if statement.contains(pattern) {
            let mutated = statement.replacen(pattern, replacement, 1);
            if mutated != statement {
                debug!(pattern, replacement, "Mutated by swap rule");
                return Some(mutated);
            }
        }
    }

    let rewritten = rewrite_ending(statement).filter(|m| m != statement);
    if rewritten.is_none() {
        warn!(statement = %preview(statement), "No mutation rule matched");
    }
    rewritten
}

/// Mutation rules followed by the fallback cascade. On failure returns the
/// statement unchanged with [`FalseSource::None`].
pub fn falsify_with_fallback(statement: &str) -> (String, FalseSource) {
    if let Some(mutated) = apply_rules(statement) {
        return (mutated, FalseSource::Mutator);
    }

    for (suffix, replacement) in FALLBACK_ENDINGS {
        if let Some(mutated) = replace_suffix(statement, suffix, replacement)
            && mutated != statement
        {
            info!(suffix, "Falsified by sentence-end negation");
            return (mutated, FalseSource::Fallback);
        }
    }

    // Each flip is tried on its own here, unlike the single pass in the rules.
    for (word, replacement) in [("必ず", ""), ("必須", "任意"), ("必要", "不要")] {
        if !statement.contains(word) {
            continue;
        }
        let mutated = if replacement.is_empty() {
            statement.replace(word, "").replace("  ", " ").trim().to_string()
        } else {
            statement.replace(word, replacement)
        };
        if mutated != statement {
            info!(word, "Falsified by lexical flip");
            return (mutated, FalseSource::Fallback);
        }
    }

    (statement.to_string(), FalseSource::None)
}

/// Always returns a statement different from `statement`.
pub fn mutate(statement: &str) -> String {
    let (mutated, source) = falsify_with_fallback(statement);
    if source != FalseSource::None {
        return mutated;
    }
    warn!(statement = %preview(statement), "All mutations failed, prefixing");
    format!("{LAST_RESORT_PREFIX}{statement}")
}

fn preview(statement: &str) -> &str {
    crate::corpus::truncate_chars(statement, 50)
}

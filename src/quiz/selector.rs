//! Level-aware scoring of sampled chunks.
//!
//! Cheap lexical heuristics pick passages that suit the requested difficulty:
//! level keywords (each counted at most three times), a heading bonus, a bonus
//! for mid-sized passages and a penalty for passages that ask questions.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use super::model::Level;
use crate::corpus::Chunk;

const BEGINNER_KEYWORDS: &[(&str, f64)] = &[
    ("概要", 3.0),
    ("定義", 3.0),
    ("目的", 2.5),
    ("原則", 2.5),
    ("基本", 2.0),
    ("とは", 2.0),
    ("ルール", 2.0),
    ("重要性", 1.5),
    ("理由", 1.0),
];

const INTERMEDIATE_KEYWORDS: &[(&str, f64)] = &[
    ("手順", 3.0),
    ("方法", 3.0),
    ("対応", 2.5),
    ("フロー", 2.5),
    ("確認", 2.0),
    ("操作", 2.0),
    ("場合", 1.5),
    ("理由", 2.5),
    ("なぜ", 2.0),
    ("適用", 2.0),
    ("背景", 1.5),
    ("する", 1.0),
];

const ADVANCED_KEYWORDS: &[(&str, f64)] = &[
    ("例外", 3.5),
    ("禁止", 3.5),
    ("注意", 3.0),
    ("判断", 3.0),
    ("条件", 2.5),
    ("リスク", 2.5),
    ("判断基準", 3.0),
    ("例外ケース", 3.0),
    ("複合", 2.0),
    ("考慮", 2.0),
    ("罰則", 2.0),
    ("してはいけない", 3.0),
    ("禁止事項", 3.0),
];

const MAX_KEYWORD_HITS: usize = 3;
const HEADING_BONUS: f64 = 2.0;
const LENGTH_BONUS: f64 = 2.0;
const QUESTION_PENALTY: f64 = 1.0;

/// Passages of this many characters (inclusive) get the length bonus.
pub const OPTIMAL_MIN_LEN: usize = 200;
pub const OPTIMAL_MAX_LEN: usize = 800;

static HEADING: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(#+\s|第.+章|第.+節|■|●|◆)").ok());

/// Weighted keywords preferred for `level`.
pub fn level_keywords(level: Level) -> &'static [(&'static str, f64)] {
    match level {
        Level::Beginner => BEGINNER_KEYWORDS,
        Level::Intermediate => INTERMEDIATE_KEYWORDS,
        Level::Advanced => ADVANCED_KEYWORDS,
    }
}

/// Suitability of `text` as quiz material for `level`; higher is better.
pub fn score_chunk(text: &str, level: Level) -> f64 {
    let text: String = text.nfc().collect();
    let mut score = 0.0;

    for (keyword, weight) in level_keywords(level) {
        let hits = text.matches(keyword).count().min(MAX_KEYWORD_HITS);
        score += hits as f64 * weight;
    }

    if HEADING.as_ref().is_some_and(|re| re.is_match(&text)) {
        score += HEADING_BONUS;
    }

    let len = text.chars().count();
    if (OPTIMAL_MIN_LEN..=OPTIMAL_MAX_LEN).contains(&len) {
        score += LENGTH_BONUS;
    } else if len < OPTIMAL_MIN_LEN {
        score -= (OPTIMAL_MIN_LEN - len) as f64 / 100.0;
    } else {
        score -= (len - OPTIMAL_MAX_LEN) as f64 / 200.0;
    }

    if text.contains('?') || text.contains('？') {
        score -= QUESTION_PENALTY;
    }

    score
}

/// The `top_n` best chunks for `level`, best first. Ties keep input order.
pub fn select_chunks(chunks: Vec<Chunk>, level: Level, top_n: usize) -> Vec<Chunk> {
    let mut scored: Vec<(f64, Chunk)> = chunks
        .into_iter()
        .map(|chunk| (score_chunk(&chunk.text, level), chunk))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    if !scored.is_empty() {
        let top: Vec<f64> = scored
            .iter()
            .take(5)
            .map(|(s, _)| (s * 100.0).round() / 100.0)
            .collect();
        tracing::debug!(level = %level, total = scored.len(), top_n, top_scores = ?top, "Chunks scored");
    }

    scored.into_iter().take(top_n).map(|(_, chunk)| chunk).collect()
}

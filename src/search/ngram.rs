//! Character 2-gram overlap, the fallback for queries the token scorer
//! cannot split (unsegmented Japanese).

use std::collections::HashSet;

/// Substring bonus large enough to dominate any overlap count.
pub const SUBSTRING_BONUS: i64 = 100;

/// Folds newlines and runs of whitespace (including U+3000) into single
/// spaces, lowercases and trims.
pub fn normalize(text: &str) -> String {
    text.replace('\u{3000}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn compact(text: &str) -> Vec<char> {
    normalize(text).chars().filter(|c| *c != ' ').collect()
}

pub fn bigrams(text: &str) -> HashSet<(char, char)> {
    compact(text).windows(2).map(|w| (w[0], w[1])).collect()
}

/// Shared 2-gram count, plus [`SUBSTRING_BONUS`] when the whole query
/// appears in the text.
pub fn score(query: &str, text: &str) -> i64 {
    let overlap = bigrams(query).intersection(&bigrams(text)).count() as i64;

    let query_compact: String = compact(query).into_iter().collect();
    let text_compact: String = compact(text).into_iter().collect();

    if text_compact.contains(&query_compact) {
        overlap + SUBSTRING_BONUS
    } else {
        overlap
    }
}

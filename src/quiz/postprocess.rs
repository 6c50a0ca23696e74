use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::model::QuizItem;
use crate::constants::MAX_CITATIONS_PER_ITEM;
use crate::corpus::Citation;

static BRACKETED: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"【[^】]+】|\[[^\]]+\]").ok());

/// Removes `【...】` and `[...]` annotations (source labels the model likes
/// to echo) and trims.
pub fn clean_statement(statement: &str) -> String {
    match BRACKETED.as_ref() {
        Some(re) => re.replace_all(statement, "").trim().to_string(),
        None => statement.trim().to_string(),
    }
}

/// Drops repeated citations by `(source, page, quote prefix)`, keeping order.
pub fn dedup_citations(citations: Vec<Citation>) -> Vec<Citation> {
    let mut seen = HashSet::new();
    citations
        .into_iter()
        .filter(|c| seen.insert(c.key()))
        .collect()
}

/// Normalizes the statement and deduplicates and caps the citations.
pub fn postprocess_item(mut item: QuizItem) -> QuizItem {
    item.statement = clean_statement(&item.statement);
    let mut citations = dedup_citations(std::mem::take(&mut item.citations));
    citations.truncate(MAX_CITATIONS_PER_ITEM);
    item.citations = citations;
    item
}

//! Lexical (keyword) search.
//!
//! The hybrid retriever treats this as an independent candidate source next
//! to vector search; [`KeywordIndex`] is the in-process implementation.

mod error;
pub mod keyword;
pub mod ngram;
pub mod stopwords;

#[cfg(test)]
mod tests;

pub use error::SearchError;
pub use keyword::{DEFAULT_KEYWORD_MIN_SCORE, KeywordIndex};

use crate::corpus::{Chunk, SourceFilter};

/// A chunk with its integer lexical score.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordHit {
    pub chunk: Chunk,
    pub score: i64,
}

/// `(query, k, filter) -> ranked hits`, best first.
pub trait LexicalSearch: Send + Sync {
    fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&SourceFilter>,
    ) -> Result<Vec<KeywordHit>, SearchError>;
}

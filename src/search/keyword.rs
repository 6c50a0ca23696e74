use std::collections::HashSet;
use std::path::Path;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::error::SearchError;
use super::stopwords::remove_stopwords;
use super::{KeywordHit, LexicalSearch, ngram};
use crate::corpus::{Chunk, SourceFilter, load_jsonl, truncate_chars};

const WHOLE_QUERY_BONUS: i64 = 5;
const TOKEN_MATCH_BONUS: i64 = 2;
const COVERAGE_BONUS: i64 = 3;
const TRIGRAM_BONUS: i64 = 1;
const NGRAM_DEDUP_PREFIX_CHARS: usize = 50;

/// Default minimum token score for a chunk to count as a hit.
pub const DEFAULT_KEYWORD_MIN_SCORE: i64 = 2;

/// In-memory lexical index over the whole chunk list.
///
/// Token scoring runs first; when it yields nothing the query is retried
/// with 2-gram overlap.
pub struct KeywordIndex {
    chunks: RwLock<Vec<Chunk>>,
    min_score: i64,
}

impl std::fmt::Debug for KeywordIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeywordIndex")
            .field("chunks", &self.len())
            .field("min_score", &self.min_score)
            .finish()
    }
}

impl KeywordIndex {
    pub fn new(chunks: Vec<Chunk>, min_score: i64) -> Self {
        Self {
            chunks: RwLock::new(chunks),
            min_score,
        }
    }

    /// Loads the chunk list from a JSON-lines corpus.
    pub fn from_jsonl(path: impl AsRef<Path>, min_score: i64) -> Result<Self, SearchError> {
        let chunks = load_jsonl(path)?;
        info!(chunks = chunks.len(), "Keyword index built");
        Ok(Self::new(chunks, min_score))
    }

    /// Swaps the indexed chunk list (reindex).
    pub fn replace(&self, chunks: Vec<Chunk>) {
        let count = chunks.len();
        *self.chunks.write() = chunks;
        info!(chunks = count, "Keyword index replaced");
    }

    pub fn len(&self) -> usize {
        self.chunks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn min_score(&self) -> i64 {
        self.min_score
    }

    fn token_search(&self, query: &str, chunks: &[&Chunk], k: usize) -> Vec<KeywordHit> {
        let tokens: Vec<String> = remove_stopwords(query.split_whitespace())
            .into_iter()
            .map(str::to_lowercase)
            .collect();
        let query_lower = query.to_lowercase();
        let query_clean: Vec<char> = query
            .chars()
            .filter(|c| !matches!(c, ' ' | '？' | '?'))
            .flat_map(char::to_lowercase)
            .collect();

        debug!(query = %query, tokens = ?tokens, "Keyword search started");

        let mut hits: Vec<KeywordHit> = chunks
            .iter()
            .filter_map(|chunk| {
                let score = token_score(&chunk.text, &query_lower, &query_clean, &tokens);
                (score >= self.min_score).then(|| KeywordHit {
                    chunk: (*chunk).clone(),
                    score,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.cmp(&a.score));

        debug!(
            total_hits = hits.len(),
            top_scores = ?hits.iter().take(3).map(|h| h.score).collect::<Vec<_>>(),
            min_score = self.min_score,
            "Keyword search finished"
        );

        hits.truncate(k);
        hits
    }

    fn ngram_search(&self, query: &str, chunks: &[&Chunk], k: usize) -> Vec<KeywordHit> {
        let mut scored: Vec<KeywordHit> = chunks
            .iter()
            .filter_map(|chunk| {
                let score = ngram::score(query, &chunk.text);
                (score > 0).then(|| KeywordHit {
                    chunk: (*chunk).clone(),
                    score,
                })
            })
            .collect();

        scored.sort_by(|a, b| b.score.cmp(&a.score));

        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut hits = Vec::new();
        for hit in scored {
            if hits.len() >= k {
                break;
            }
            let snippet = truncate_chars(&hit.chunk.text, NGRAM_DEDUP_PREFIX_CHARS)
                .trim()
                .to_string();
            if seen.insert((hit.chunk.source.clone(), snippet)) {
                hits.push(hit);
            }
        }

        debug!(query = %query, hits = hits.len(), "2-gram fallback finished");
        hits
    }
}

fn token_score(text: &str, query_lower: &str, query_clean: &[char], tokens: &[String]) -> i64 {
    let text_lower = text.to_lowercase();
    let mut score = 0;

    if text_lower.contains(query_lower) {
        score += WHOLE_QUERY_BONUS;
    }

    if !tokens.is_empty() {
        let mut matched = 0usize;
        for token in tokens {
            if token.chars().count() >= 2 && text_lower.contains(token.as_str()) {
                matched += 1;
                score += TOKEN_MATCH_BONUS;
            }
        }
        if matched * 2 >= tokens.len() {
            score += COVERAGE_BONUS;
        }
    }

    if query_clean.len() >= 3 {
        let hit = query_clean.windows(3).any(|w| {
            let window: String = w.iter().collect();
            text_lower.contains(&window)
        });
        if hit {
            score += TRIGRAM_BONUS;
        }
    }

    score
}

impl LexicalSearch for KeywordIndex {
    fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&SourceFilter>,
    ) -> Result<Vec<KeywordHit>, SearchError> {
        let query = query.trim();
        if query.is_empty() || k == 0 {
            return Ok(vec![]);
        }

        let guard = self.chunks.read();
        let chunks: Vec<&Chunk> = guard
            .iter()
            .filter(|c| filter.is_none_or(|f| f.allows(&c.source)))
            .collect();

        let hits = self.token_search(query, &chunks, k);
        if !hits.is_empty() {
            return Ok(hits);
        }

        Ok(self.ngram_search(query, &chunks, k))
    }
}

//! Chunk and citation data model shared by retrieval and quiz generation.
//!
//! Chunks are produced by an external loader/chunker and arrive here as JSON
//! lines (see [`load_jsonl`]). Source names are compared after Unicode NFC
//! normalization everywhere, since filenames from macOS volumes are often NFD.

mod error;


pub use error::CorpusError;

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::constants::{CITATION_KEY_PREFIX_CHARS, UNKNOWN_SOURCE};

/// An indexed passage. Immutable once indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub source: String,
    /// `None` for non-paginated sources.
    pub page: Option<u32>,
    pub chunk_index: u32,
    pub text: String,
}

/// Identity of a chunk within the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ChunkKey {
    pub source: String,
    pub page: Option<u32>,
    pub chunk_index: u32,
}

impl Chunk {
    pub fn new(source: impl Into<String>, page: Option<u32>, chunk_index: u32, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            page: normalize_page(page),
            chunk_index,
            text: text.into(),
        }
    }

    pub fn key(&self) -> ChunkKey {
        ChunkKey {
            source: self.source.clone(),
            page: self.page,
            chunk_index: self.chunk_index,
        }
    }

    /// NFC-normalized source name (`"unknown"` when blank).
    pub fn normalized_source(&self) -> String {
        normalize_source(&self.source)
    }

    /// Builds a citation whose quote is the first `max_chars` characters.
    pub fn to_citation(&self, max_chars: usize) -> Citation {
        Citation {
            source: self.source.clone(),
            page: normalize_page(self.page),
            quote: truncate_chars(&self.text, max_chars).to_string(),
        }
    }
}

/// A bounded excerpt with provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    #[serde(default)]
    pub page: Option<u32>,
    pub quote: String,
}

/// `(source, page, quote prefix)` identity used to deduplicate citations.
pub type CitationKey = (String, Option<u32>, String);

impl Citation {
    pub fn new(source: impl Into<String>, page: Option<u32>, quote: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            page: normalize_page(page),
            quote: quote.into(),
        }
    }

    /// Dedup identity over the first 60 characters of the quote.
    pub fn key(&self) -> CitationKey {
        citation_key(&self.source, self.page, &self.quote)
    }
}

/// Builds the dedup identity for a passage without materializing a [`Citation`].
pub fn citation_key(source: &str, page: Option<u32>, text: &str) -> CitationKey {
    (
        source.to_string(),
        normalize_page(page),
        truncate_chars(text, CITATION_KEY_PREFIX_CHARS).trim().to_string(),
    )
}

/// Unicode NFC normalization of a source name. Blank names map to `"unknown"`.
pub fn normalize_source(source: &str) -> String {
    if source.is_empty() {
        return UNKNOWN_SOURCE.to_string();
    }
    source.nfc().collect()
}

/// Page `0` is how the chunker marks "no page"; treat it as absent.
pub fn normalize_page(page: Option<u32>) -> Option<u32> {
    page.filter(|p| *p > 0)
}

/// Returns the longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Allow-list of sources compared after NFC normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFilter {
    allowed: HashSet<String>,
    ordered: Vec<String>,
}

impl SourceFilter {
    /// Builds a filter from raw source names; returns `None` for an empty list.
    pub fn from_sources<I, S>(sources: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self::default();
        for source in sources {
            let norm = normalize_source(source.as_ref());
            if filter.allowed.insert(norm.clone()) {
                filter.ordered.push(norm);
            }
        }
        (!filter.allowed.is_empty()).then_some(filter)
    }

    pub fn allows(&self, source: &str) -> bool {
        self.allowed.contains(&normalize_source(source))
    }

    /// Normalized names in insertion order.
    pub fn sources(&self) -> &[String] {
        &self.ordered
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

#[derive(Deserialize)]
struct ChunkRecord {
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    page: Option<i64>,
    #[serde(default)]
    chunk_index: u32,
    text: String,
}

/// Reads one chunk per line. Blank lines are skipped.
pub fn load_jsonl(path: impl AsRef<Path>) -> Result<Vec<Chunk>, CorpusError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| CorpusError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut chunks = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| CorpusError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let record: ChunkRecord =
            serde_json::from_str(&line).map_err(|source| CorpusError::Parse {
                path: path.to_path_buf(),
                line: idx + 1,
                source,
            })?;
        let page = record
            .page
            .and_then(|p| u32::try_from(p).ok())
            .filter(|p| *p > 0);
        chunks.push(Chunk {
            source: record.source.unwrap_or_else(|| UNKNOWN_SOURCE.to_string()),
            page,
            chunk_index: record.chunk_index,
            text: record.text,
        });
    }

    Ok(chunks)
}

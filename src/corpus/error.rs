use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading a chunked corpus from disk.
#[derive(Debug, Error)]
pub enum CorpusError {
    /// The corpus file could not be opened or read.
    #[error("failed to read corpus '{path}': {source}")]
    Io {
        /// Corpus path.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line was not a valid chunk record.
    #[error("invalid chunk record at {path}:{line}: {source}")]
    Parse {
        /// Corpus path.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

use thiserror::Error;

use crate::corpus::CorpusError;

/// Errors returned by lexical search backends.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The chunk list backing the index could not be loaded.
    #[error("failed to load keyword index: {0}")]
    Corpus(#[from] CorpusError),

    /// The backend could not serve the query.
    #[error("keyword search unavailable: {message}")]
    Unavailable {
        /// Error message.
        message: String,
    },
}

use thiserror::Error;

use crate::vectordb::VectorDbError;

/// Errors that abort a retrieval call.
///
/// Failures of a single candidate source or of the reranker never surface
/// here; they degrade to fewer candidates.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The indexed chunk count could not be read.
    #[error("failed to count indexed chunks: {0}")]
    CollectionCount(#[source] VectorDbError),
}

use thiserror::Error;

/// Failures talking to the chunk collection.
///
/// Retrieval degrades on these (an empty semantic side, an uncached pool);
/// only indexing surfaces them to the caller.
#[derive(Debug, Error)]
pub enum VectorDbError {
    #[error("cannot reach Qdrant at '{url}': {message}")]
    ConnectionFailed { url: String, message: String },

    #[error("cannot create chunk collection '{collection}': {message}")]
    CreateCollectionFailed { collection: String, message: String },

    /// Used before `ensure_collection` or after the collection was dropped.
    #[error("chunk collection '{collection}' does not exist; index the corpus first")]
    CollectionNotFound { collection: String },

    #[error("cannot upsert chunks into '{collection}': {message}")]
    UpsertFailed { collection: String, message: String },

    #[error("vector query on '{collection}' failed: {message}")]
    SearchFailed { collection: String, message: String },

    /// Point lookup, scroll or count failed.
    #[error("cannot read chunks from '{collection}': {message}")]
    ReadFailed { collection: String, message: String },

    /// Every chunk of an upsert needs exactly one vector.
    #[error("{chunks} chunks but {vectors} vectors in upsert batch")]
    BatchMismatch { chunks: usize, vectors: usize },

    #[error("vector of dimension {actual} does not fit collection dimension {expected}")]
    InvalidDimension { expected: usize, actual: usize },
}

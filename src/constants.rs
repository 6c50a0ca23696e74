//! Cross-cutting, shared constants.
//!
//! Numeric defaults for the tunable pipeline settings live next to their
//! config structs in [`crate::config`]; the values here are fixed by the
//! data model and shared by several modules.

/// Output dimension of the default e5-small embedder.
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

pub const DEFAULT_VECTOR_SIZE_U64: u64 = DEFAULT_EMBEDDING_DIM as u64;

/// Token budget for both the embedder and the cross-encoder.
pub const DEFAULT_MAX_SEQ_LEN: usize = 512;

/// Prefix length (chars) used for citation identity `(source, page, prefix)`.
pub const CITATION_KEY_PREFIX_CHARS: usize = 60;

/// Quote length (chars) for citations returned by hybrid retrieval.
pub const ASK_QUOTE_MAX_CHARS: usize = 400;

/// Upper bound on citations attached to a single quiz item.
pub const MAX_CITATIONS_PER_ITEM: usize = 5;

/// Length (chars) of raw LLM output kept for diagnostics.
pub const RAW_EXCERPT_CHARS: usize = 200;

/// Source label for chunks that carry no source metadata.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Runtime dimension check used at embedder/store boundaries.
pub fn validate_embedding_dim(expected: usize, actual: usize) -> Result<(), DimValidationError> {
    if expected == 0 {
        return Err(DimValidationError::ZeroDimension);
    }
    if expected != actual {
        return Err(DimValidationError::Mismatch { expected, actual });
    }
    Ok(())
}

/// Errors from [`validate_embedding_dim`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DimValidationError {
    #[error("embedding dimension cannot be zero")]
    ZeroDimension,

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    Mismatch { expected: usize, actual: usize },
}

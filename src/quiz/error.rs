use thiserror::Error;

use crate::llm::LlmError;
use crate::vectordb::VectorDbError;

/// Errors from sampling retrieval. None of them abort the hosting process;
/// callers turn them into an empty citation set plus a debug message.
#[derive(Debug, Error)]
pub enum QuizError {
    /// The store holds no chunks, so the pool has nothing to sample.
    #[error("chunk pool is empty")]
    PoolEmpty,

    /// Sampling retrieval is single-source; no source was given.
    #[error("a source is required for quiz sampling")]
    SourceRequired,

    /// Sampling retrieval is single-source; several were given.
    #[error("exactly one source may be given for quiz sampling ({count} given)")]
    MultipleSources {
        /// Number of sources in the request.
        count: usize,
    },

    /// The requested source has no pooled chunks.
    #[error("no chunks found for source '{source_name}'")]
    SourceNotFound {
        /// NFC-normalized source name.
        source_name: String,
    },

    /// Fetching sampled chunk bodies failed.
    #[error("failed to fetch sampled chunks: {0}")]
    Store(#[from] VectorDbError),
}

/// Category of an LLM output that could not be turned into quiz items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Blank output.
    EmptyResponse,
    /// No `{ ... }` block found.
    JsonExtraction,
    /// The block is not valid JSON.
    JsonParse,
    /// Valid JSON without a usable `quizzes` list.
    JsonValidation,
    /// The list decoded but no item survived.
    GeneratedZeroQuizzes,
}

impl ParseErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyResponse => "empty_response",
            Self::JsonExtraction => "json_extraction_error",
            Self::JsonParse => "json_parse_error",
            Self::JsonValidation => "json_validation_error",
            Self::GeneratedZeroQuizzes => "generated_zero_quizzes",
        }
    }

    /// Whether one repair round-trip with the LLM is worth trying.
    pub fn is_repairable(&self) -> bool {
        !matches!(self, Self::GeneratedZeroQuizzes)
    }
}

/// Failure to parse LLM quiz output. Displays as `kind` or `kind: detail`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub detail: Option<String>,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind) -> Self {
        Self { kind, detail: None }
    }

    pub fn with_detail(kind: ParseErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: Some(detail.into()),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {detail}", self.kind.as_str()),
            None => f.write_str(self.kind.as_str()),
        }
    }
}

impl std::error::Error for ParseError {}

/// Terminal failure of one generation call (LLM call plus at most one repair).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// The output could not be parsed and the error kind is not repairable.
    #[error("parse_failed: {reason}")]
    ParseFailed {
        /// Parser error string.
        reason: String,
    },

    /// The repair round-trip came back unparseable too.
    #[error("json_fix_failed: {reason}")]
    JsonFixFailed {
        /// Parser error string of the repaired output.
        reason: String,
    },

    /// The chat call itself failed.
    #[error(transparent)]
    Llm(#[from] LlmError),
}

impl GenerationError {
    /// Stable label recorded in attempt diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ParseFailed { .. } => "parse_failed",
            Self::JsonFixFailed { .. } => "json_fix_failed",
            Self::Llm(e) => e.kind(),
        }
    }
}

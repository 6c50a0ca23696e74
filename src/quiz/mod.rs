//! Citation-grounded true/false quiz generation.
//!
//! Flow of one quiz set:
//! 1. Material: [`sampling`] draws chunks of one source from the [`pool`] and
//!    ranks them with the level heuristics in [`selector`].
//! 2. [`orchestrator`] asks the LLM for one true statement per citation
//!    ([`generator`], [`prompt`], [`parser`]), validates it ([`validator`]),
//!    derives a false counterpart ([`mutator`]) and drops repeats
//!    ([`duplicate`]).
//! 3. Positions 4 and 5 of the result are turned into false statements.
//! 4. [`service`] ties the steps together and saves the set in the [`store`].

pub mod citation_matcher;
pub mod duplicate;
mod error;
pub mod generator;
pub mod model;
pub mod mutator;
pub mod orchestrator;
pub mod parser;
pub mod pool;
pub mod postprocess;
pub mod prompt;
pub mod sampling;
pub mod selector;
pub mod service;
pub mod store;
pub mod validator;

#[cfg(test)]
mod tests;

pub use citation_matcher::CitationMatcher;
pub use duplicate::is_duplicate_statement;
pub use error::{GenerationError, ParseError, ParseErrorKind, QuizError};
pub use generator::{
    AttemptError, AttemptStage, GenerationCall, GenerationRequest, GenerationStats, RejectedItem,
    ValidationBatch, generate_quizzes, validate_and_process,
};
pub use model::{FalseSource, Level, QuizItem, QuizType};
pub use mutator::{falsify_with_fallback, mutate};
pub use orchestrator::{GenerationReport, Orchestrator, QuizRequest, TerminationReason};
pub use pool::{ChunkPool, SourcePool};
pub use sampling::{SamplingDebug, SamplingOutcome, SamplingRetriever};
pub use service::{MaterialDebug, QuizService, QuizSetResponse, SingleQuizResponse};
pub use store::{JudgeResult, QuizStore};
pub use validator::{Rejection, validate_item};

use thiserror::Error;

use crate::llm::LlmError;
use crate::retrieval::RetrievalError;

/// Failure of a grounded answer.
#[derive(Debug, Error)]
pub enum AskError {
    /// Retrieval could not run (the store count failed).
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    /// The answer call failed.
    #[error(transparent)]
    Llm(#[from] LlmError),
}

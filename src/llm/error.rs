use thiserror::Error;

/// Failure kinds of a chat call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LlmError {
    /// The call did not finish within its timeout.
    #[error("LLM call timed out after {timeout_secs}s")]
    Timeout {
        /// Timeout that elapsed.
        timeout_secs: u64,
    },

    /// Provider error, transport error or empty output.
    #[error("LLM internal error: {message}")]
    Internal {
        /// Error message (`empty_response` for blank output).
        message: String,
    },
}

impl LlmError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable label recorded in attempt diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Internal { .. } => "llm_internal_error",
        }
    }
}

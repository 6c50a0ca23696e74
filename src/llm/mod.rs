//! Chat LLM boundary.
//!
//! The core only needs `(messages, mode) -> text`; [`GenaiChatClient`] talks to
//! a provider through `genai`, [`MockChatClient`] replays scripted output.

mod error;
pub mod genai_client;
#[cfg(any(test, feature = "mock"))]
pub mod mock;


pub use error::LlmError;
pub use genai_client::GenaiChatClient;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockChatClient;

use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Which generation profile to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMode {
    /// Grounded answers to user questions.
    Answer,
    /// Quiz generation (dedicated model, low temperature, blank output is an error).
    Quiz,
}

/// `(messages, mode) -> text`, failing with [`LlmError::Timeout`] or
/// [`LlmError::Internal`]. Never streams.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn chat(&self, messages: &[Message], mode: ChatMode) -> Result<String, LlmError>;
}

use std::time::{Duration, Instant};

use async_trait::async_trait;
use genai::Client;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest};
use tracing::{debug, error, info};

use super::{ChatClient, ChatMode, LlmError, Message, Role};
use crate::config::Config;

/// Sampling temperature for quiz generation.
pub const QUIZ_TEMPERATURE: f64 = 0.3;

/// Output token cap for quiz generation.
pub const QUIZ_MAX_OUTPUT_TOKENS: u32 = 2048;

/// Chat client over `genai`, which resolves the provider from the model name
/// and reads credentials from the provider's usual environment variable.
#[derive(Clone)]
pub struct GenaiChatClient {
    client: Client,
    answer_model: String,
    quiz_model: String,
    timeout: Duration,
}

impl std::fmt::Debug for GenaiChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenaiChatClient")
            .field("answer_model", &self.answer_model)
            .field("quiz_model", &self.quiz_model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl GenaiChatClient {
    pub fn new(answer_model: impl Into<String>, quiz_model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::default(),
            answer_model: answer_model.into(),
            quiz_model: quiz_model.into(),
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.llm_model, &config.llm_quiz_model, config.llm_timeout())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn model_for(&self, mode: ChatMode) -> &str {
        match mode {
            ChatMode::Answer => &self.answer_model,
            ChatMode::Quiz => &self.quiz_model,
        }
    }
}

fn to_genai_message(message: &Message) -> ChatMessage {
    match message.role {
        Role::System => ChatMessage::system(message.content.clone()),
        Role::User => ChatMessage::user(message.content.clone()),
        Role::Assistant => ChatMessage::assistant(message.content.clone()),
    }
}

#[async_trait]
impl ChatClient for GenaiChatClient {
    async fn chat(&self, messages: &[Message], mode: ChatMode) -> Result<String, LlmError> {
        let model = self.model_for(mode);
        let request = ChatRequest::new(messages.iter().map(to_genai_message).collect());
        let options = match mode {
            ChatMode::Answer => None,
            ChatMode::Quiz => Some(
                ChatOptions::default()
                    .with_temperature(QUIZ_TEMPERATURE)
                    .with_max_tokens(QUIZ_MAX_OUTPUT_TOKENS),
            ),
        };

        debug!(model, mode = ?mode, messages = messages.len(), "Sending chat request");
        let started = Instant::now();

        let response = tokio::time::timeout(
            self.timeout,
            self.client.exec_chat(model, request, options.as_ref()),
        )
        .await
        .map_err(|_| {
            error!(model, timeout_secs = self.timeout.as_secs(), "LLM call timed out");
            LlmError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        })?
        .map_err(|e| {
            error!(model, error = %e, "LLM provider error");
            LlmError::internal(e.to_string())
        })?;

        let text = response.first_text().unwrap_or_default().to_string();
        if text.trim().is_empty() {
            error!(model, "LLM returned an empty response");
            return Err(LlmError::internal("empty_response"));
        }

        info!(
            model,
            chars = text.chars().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "LLM response received"
        );
        Ok(text)
    }
}

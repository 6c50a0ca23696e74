//! Grounded question answering: hybrid retrieval, then an answer written
//! only from the retrieved citations.

mod error;

#[cfg(test)]
mod tests;

pub use error::AskError;

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::corpus::{Citation, SourceFilter};
use crate::llm::{ChatClient, ChatMode, Message};
use crate::quiz::prompt::numbered_citations;
use crate::retrieval::{FusionWeights, HybridRetriever, RetrievalDebug};
use crate::vectordb::ChunkStore;

/// What the model says when the citations do not cover the question.
pub const UNKNOWN_ANSWER: &str = "根拠からは分かりません";

const ASK_SYSTEM_PROMPT: &str = "あなたは与えられた根拠（citations）を基に質問に答えるアシスタントです。

原則：
- 提供された根拠のみを基に回答してください
- 根拠に含まれていない情報は推測せず、「根拠からは分かりません」と述べてください
- 根拠が複数ある場合は、それらを統合して回答してください
- 回答は日本語で、簡潔にまとめてください
- 回答本文には「根拠1」「(根拠2)」「参照3」などの番号参照を書かないでください（根拠はcitationsとして別に表示されるため、本文は結論と理由を自然な日本語で述べてください）";

/// System and user messages for answering `question` from `citations`.
pub fn ask_messages(question: &str, citations: &[Citation]) -> Vec<Message> {
    let context = if citations.is_empty() {
        "【根拠】\n根拠が見つかりませんでした。".to_string()
    } else {
        format!("【根拠】\n\n{}", numbered_citations(citations))
    };
    let user = format!("以下の質問に、提供された根拠を基に回答してください。\n\n【質問】\n{question}\n\n{context}");
    vec![Message::system(ASK_SYSTEM_PROMPT), Message::user(user)]
}

#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<RetrievalDebug>,
}

/// Answers questions over the indexed corpus.
pub struct Answerer<S> {
    retriever: Arc<HybridRetriever<S>>,
    client: Arc<dyn ChatClient>,
}

impl<S> std::fmt::Debug for Answerer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Answerer").finish_non_exhaustive()
    }
}

impl<S: ChunkStore> Answerer<S> {
    pub fn new(retriever: Arc<HybridRetriever<S>>, client: Arc<dyn ChatClient>) -> Self {
        Self { retriever, client }
    }

    /// Retrieves citations for `question` and asks the LLM for an answer.
    /// With no citations the LLM is skipped and [`UNKNOWN_ANSWER`] returned.
    #[instrument(skip(self, question, filter), fields(question_len = question.len()))]
    pub async fn ask(
        &self,
        question: &str,
        filter: Option<&SourceFilter>,
        include_debug: bool,
    ) -> Result<AskResponse, AskError> {
        let top_k = self.retriever.config().top_k;
        let outcome = self
            .retriever
            .retrieve(question, FusionWeights::default(), top_k, filter, include_debug)
            .await?;

        if outcome.citations.is_empty() {
            warn!("No citations for question");
            return Ok(AskResponse {
                answer: UNKNOWN_ANSWER.to_string(),
                citations: Vec::new(),
                debug: outcome.debug,
            });
        }

        let messages = ask_messages(question, &outcome.citations);
        let answer = self.client.chat(&messages, ChatMode::Answer).await?;
        info!(citations = outcome.citations.len(), answer_chars = answer.chars().count(), "Answered");

        Ok(AskResponse {
            answer: answer.trim().to_string(),
            citations: outcome.citations,
            debug: outcome.debug,
        })
    }
}

use std::sync::Arc;

use super::*;
use crate::config::RetrievalConfig;
use crate::corpus::Chunk;
use crate::embedding::{CrossEncoder, E5Embedder, EmbedRole, RerankerError, TextEmbedder};
use crate::llm::{LlmError, MockChatClient};
use crate::search::{DEFAULT_KEYWORD_MIN_SCORE, KeywordIndex};
use crate::vectordb::{ChunkStore, MockChunkStore};

struct UniformCrossEncoder(f32);

impl CrossEncoder for UniformCrossEncoder {
    fn score_batch(&self, _query: &str, passages: &[&str]) -> Result<Vec<f32>, RerankerError> {
        Ok(vec![self.0; passages.len()])
    }
}

fn corpus() -> Vec<Chunk> {
    vec![
        Chunk::new("manual.txt", Some(1), 0, "レジ締めは閉店後に二人で行う。"),
        Chunk::new("manual.txt", Some(1), 1, "警察への通報は店長が行う。"),
        Chunk::new("guide.txt", Some(2), 2, "防犯カメラの映像は一か月保存する。"),
    ]
}

async fn answerer(chunks: Vec<Chunk>, client: Arc<MockChatClient>) -> Answerer<MockChunkStore> {
    let embedder = E5Embedder::stub();
    let store = MockChunkStore::new();
    store
        .ensure_collection(embedder.dimension() as u64)
        .await
        .unwrap();
    if !chunks.is_empty() {
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = embedder.embed_batch(&texts, EmbedRole::Passage).unwrap();
        store.upsert(&chunks, vectors).await.unwrap();
    }

    let retriever = HybridRetriever::new(
        Arc::new(store),
        Arc::new(embedder),
        Arc::new(UniformCrossEncoder(1.0)),
        Arc::new(KeywordIndex::new(chunks, DEFAULT_KEYWORD_MIN_SCORE)),
        RetrievalConfig::default(),
    );
    Answerer::new(Arc::new(retriever), client)
}

#[test]
fn test_ask_messages_number_citations() {
    let citations = vec![
        Citation::new("manual.txt", Some(3), "レジ締めは閉店後に二人で行う。"),
        Citation::new("guide.txt", None, "防犯カメラの映像は一か月保存する。"),
    ];
    let messages = ask_messages("レジ締めは誰が行う？", &citations);

    assert_eq!(messages.len(), 2);
    assert!(messages[0].content.contains("根拠からは分かりません"));
    let user = &messages[1].content;
    assert!(user.contains("【質問】\nレジ締めは誰が行う？"));
    assert!(user.contains("1. [manual.txt (p.3)]\nレジ締めは閉店後に二人で行う。"));
    assert!(user.contains("2. [guide.txt]\n防犯カメラの映像は一か月保存する。"));
}

#[test]
fn test_ask_messages_without_citations() {
    let messages = ask_messages("質問", &[]);
    assert!(messages[1].content.ends_with("【根拠】\n根拠が見つかりませんでした。"));
}

#[tokio::test]
async fn test_empty_collection_skips_llm() {
    let client = Arc::new(MockChatClient::scripted(Vec::new()));
    let answerer = answerer(Vec::new(), client.clone()).await;

    let response = answerer.ask("レジ締めは誰が行う？", None, true).await.unwrap();

    assert_eq!(response.answer, UNKNOWN_ANSWER);
    assert!(response.citations.is_empty());
    assert_eq!(
        response.debug.and_then(|d| d.zero_reason).as_deref(),
        Some("collection_count=0")
    );
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn test_answer_uses_retrieved_citations() {
    let client = Arc::new(MockChatClient::with_responder(|_, mode| {
        assert_eq!(mode, ChatMode::Answer);
        Ok("  閉店後に二人で行います。\n".to_string())
    }));
    let answerer = answerer(corpus(), client.clone()).await;

    let response = answerer.ask("レジ締めは誰が行う？", None, false).await.unwrap();

    assert_eq!(response.answer, "閉店後に二人で行います。");
    assert!(!response.citations.is_empty());
    assert!(response.debug.is_none());
    assert_eq!(client.call_count(), 1);

    let prompt = &client.requests()[0][1].content;
    assert!(prompt.contains("【質問】\nレジ締めは誰が行う？"));
    assert!(response.citations.iter().all(|c| prompt.contains(&c.quote)));
}

#[tokio::test]
async fn test_source_filter_limits_citations() {
    let client = Arc::new(MockChatClient::with_responder(|_, _| Ok("一か月です。".to_string())));
    let answerer = answerer(corpus(), client).await;
    let filter = SourceFilter::from_sources(["guide.txt"]);

    let response = answerer
        .ask("防犯カメラの映像の保存期間は？", filter.as_ref(), false)
        .await
        .unwrap();

    assert!(!response.citations.is_empty());
    assert!(response.citations.iter().all(|c| c.source == "guide.txt"));
}

#[tokio::test]
async fn test_llm_error_is_propagated() {
    let client = Arc::new(MockChatClient::scripted([Err(LlmError::Timeout { timeout_secs: 60 })]));
    let answerer = answerer(corpus(), client).await;

    let err = answerer.ask("レジ締めは誰が行う？", None, false).await.unwrap_err();
    assert!(matches!(err, AskError::Llm(LlmError::Timeout { timeout_secs: 60 })));
}

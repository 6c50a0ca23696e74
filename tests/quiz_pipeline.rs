//! Quiz generation end to end over the in-memory store and a scripted LLM.

use std::sync::Arc;

use quizrag::config::{QuizConfig, RetrievalConfig};
use quizrag::corpus::Chunk;
use quizrag::embedding::{E5Embedder, EmbedRole, Reranker, TextEmbedder};
use quizrag::llm::{ChatMode, Message, MockChatClient};
use quizrag::quiz::{
    ChunkPool, Level, MaterialDebug, Orchestrator, QuizItem, QuizRequest, QuizService, QuizStore,
    SamplingRetriever, TerminationReason,
};
use quizrag::retrieval::HybridRetriever;
use quizrag::search::KeywordIndex;
use quizrag::vectordb::{ChunkStore, MockChunkStore};

fn manual() -> Vec<Chunk> {
    (0..20)
        .map(|i| Chunk::new("manual.txt", Some(i / 4 + 1), i, format!("受付番号{i}の書類は本部で保管する。")))
        .collect()
}

/// Replies with the quote of the single citation in the prompt.
fn echo_quote(messages: &[Message], mode: ChatMode) -> Result<String, quizrag::LlmError> {
    assert_eq!(mode, ChatMode::Quiz);
    let user = &messages[messages.len() - 1].content;
    let start = user.find("1. [").unwrap();
    let rest = &user[start..];
    let rest = &rest[rest.find("]\n").unwrap() + 2..];
    let quote = &rest[..rest.find("\n\n").unwrap()];
    Ok(serde_json::json!({
        "quizzes": [{
            "type": "true_false",
            "statement": quote,
            "answer_bool": true,
            "explanation": "本文の記載の通り。",
            "citations": []
        }]
    })
    .to_string())
}

/// Like [`echo_quote`], but also proposes its own false statement.
fn echo_with_false(messages: &[Message], mode: ChatMode) -> Result<String, quizrag::LlmError> {
    let reply = echo_quote(messages, mode)?;
    let mut value: serde_json::Value = serde_json::from_str(&reply).unwrap();
    value["quizzes"][0]["false_statement"] = "LLMが作った誤りの文章である。".into();
    Ok(value.to_string())
}

async fn service(chunks: Vec<Chunk>, client: Arc<MockChatClient>) -> QuizService<MockChunkStore> {
    let embedder = Arc::new(E5Embedder::stub());
    let store = MockChunkStore::new();
    store
        .ensure_collection(embedder.dimension() as u64)
        .await
        .unwrap();
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    let vectors = embedder.embed_batch(&texts, EmbedRole::Passage).unwrap();
    store.upsert(&chunks, vectors).await.unwrap();
    let store = Arc::new(store);

    let config = QuizConfig::default();
    let retriever = Arc::new(HybridRetriever::new(
        Arc::clone(&store),
        embedder,
        Arc::new(Reranker::stub()),
        Arc::new(KeywordIndex::new(chunks, 2)),
        RetrievalConfig::default(),
    ));
    let sampler = SamplingRetriever::new(Arc::new(ChunkPool::from_config(store, &config)), config.clone());
    let orchestrator = Orchestrator::new(client, config, std::time::Duration::from_secs(60));
    QuizService::new(sampler, retriever, orchestrator, Arc::new(QuizStore::new()))
}

#[tokio::test]
async fn test_single_source_quiz_set() {
    let client = Arc::new(MockChatClient::with_responder(echo_quote));
    let service = service(manual(), client.clone()).await;
    let request = QuizRequest::new(Level::Beginner, 5).with_source("manual.txt");

    let response = service.generate(&request).await;

    assert_eq!(response.total_count, 5);
    assert_eq!(response.termination, TerminationReason::TargetReached);
    assert_eq!(response.error_info, None);
    assert!(matches!(response.material, MaterialDebug::Sampling(_)));

    let quizzes = &response.quizzes;
    assert!(quizzes[..3].iter().all(|q| q.answer_bool));
    assert!(!quizzes[3].answer_bool);
    assert!(!quizzes[4].answer_bool);
    assert_ne!(quizzes[3].statement, quizzes[4].statement);
    for false_item in &quizzes[3..] {
        assert!(quizzes[..3].iter().all(|t| t.statement != false_item.statement));
    }
    for quiz in quizzes {
        assert_eq!(quiz.citations.len(), 1);
        assert_eq!(quiz.citations[0].source, "manual.txt");
    }

    let id = response.quiz_set_id.as_deref().unwrap();
    let saved: Vec<QuizItem> = serde_json::from_str(&service.store().get_set(id).unwrap()).unwrap();
    assert_eq!(saved.len(), 5);
    assert_eq!(saved[3].statement, quizzes[3].statement);
}

#[tokio::test]
async fn test_unknown_source_yields_failed_set() {
    let client = Arc::new(MockChatClient::with_responder(echo_quote));
    let service = service(manual(), client.clone()).await;
    let request = QuizRequest::new(Level::Beginner, 5).with_source("missing.txt");

    let response = service.generate(&request).await;

    assert_eq!(response.total_count, 0);
    assert_eq!(response.termination, TerminationReason::NoCitations);
    assert_eq!(response.error_info.as_deref(), Some("generation_failed"));
    assert!(response.quiz_set_id.is_none());
    assert!(matches!(response.material, MaterialDebug::Failed { .. }));
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn test_no_source_falls_back_to_search() {
    let client = Arc::new(MockChatClient::with_responder(echo_quote));
    let service = service(manual(), client).await;
    let request = QuizRequest::new(Level::Beginner, 3).with_topic("書類");

    let response = service.generate(&request).await;

    match &response.material {
        MaterialDebug::Search { query, .. } => assert!(query.starts_with("書類 ")),
        other => panic!("unexpected material: {other:?}"),
    }
    assert!(response.total_count <= 3);
}

#[tokio::test]
async fn test_fixed_false_items_come_from_mutator() {
    let client = Arc::new(MockChatClient::with_responder(echo_with_false));
    let service = service(manual(), client).await;
    let request = QuizRequest::new(Level::Beginner, 5).with_source("manual.txt");

    let response = service.generate(&request).await;

    assert_eq!(response.total_count, 5);
    for quiz in &response.quizzes {
        assert_ne!(quiz.statement, "LLMが作った誤りの文章である。");
    }
    for quiz in &response.quizzes[3..] {
        assert!(!quiz.answer_bool);
        assert!(quiz.statement.ends_with("保管を後回しにする。"), "{}", quiz.statement);
    }
    assert_eq!(response.stats.false_source_stats.mutator, 5);
}

#[tokio::test]
async fn test_single_quiz_is_saved_and_judged() {
    let client = Arc::new(MockChatClient::with_responder(echo_quote));
    let service = service(manual(), client.clone()).await;
    let request = QuizRequest::new(Level::Beginner, 5).with_source("manual.txt");

    let single = service.generate_single(&request).await.unwrap();

    assert_eq!(client.call_count(), 1);
    assert!(single.quiz.answer_bool);
    assert_eq!(service.store().get(&single.quiz_id).unwrap(), single.quiz);

    let right = service.judge(&single.quiz_id, true).unwrap();
    assert!(right.is_correct);
    assert_eq!(right.citations, single.quiz.citations);
    let wrong = service.judge(&single.quiz_id, false).unwrap();
    assert!(!wrong.is_correct);
    assert!(wrong.correct_answer);
    assert!(service.judge("unknown", true).is_none());
}

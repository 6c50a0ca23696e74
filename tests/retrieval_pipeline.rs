//! Hybrid retrieval over the in-memory store.

use std::sync::Arc;

use quizrag::config::RetrievalConfig;
use quizrag::corpus::{Chunk, SourceFilter};
use quizrag::embedding::{E5Embedder, EmbedRole, Reranker, TextEmbedder};
use quizrag::retrieval::{FusionWeights, HybridRetriever, candidate_k};
use quizrag::search::KeywordIndex;
use quizrag::vectordb::{ChunkStore, DEFAULT_VECTOR_SIZE, MockChunkStore};

fn corpus() -> Vec<Chunk> {
    vec![
        Chunk::new("manual.txt", Some(1), 0, "防犯カメラの映像は一か月保存する。"),
        Chunk::new("manual.txt", Some(2), 1, "防犯カメラの設置場所は店長が決める。"),
        Chunk::new("guide.txt", Some(1), 2, "防犯カメラの録画装置は事務所に置く。"),
        Chunk::new("guide.txt", Some(2), 3, "レジ締めは閉店後に二人で行う。"),
        Chunk::new("guide.txt", Some(3), 4, "警察への通報は店長が行う。"),
    ]
}

async fn store(chunks: &[Chunk]) -> Arc<MockChunkStore> {
    let embedder = E5Embedder::stub();
    let store = MockChunkStore::new();
    store
        .ensure_collection(embedder.dimension() as u64)
        .await
        .unwrap();
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    let vectors = embedder.embed_batch(&texts, EmbedRole::Passage).unwrap();
    store.upsert(chunks, vectors).await.unwrap();
    Arc::new(store)
}

fn retriever(store: Arc<MockChunkStore>, config: RetrievalConfig) -> HybridRetriever<MockChunkStore> {
    HybridRetriever::new(
        store,
        Arc::new(E5Embedder::stub()),
        Arc::new(Reranker::stub()),
        Arc::new(KeywordIndex::new(corpus(), 2)),
        config,
    )
}

#[test]
fn test_small_collection_uses_minimum_candidates() {
    assert_eq!(candidate_k(1000, &RetrievalConfig::default()), 20);
}

#[tokio::test]
async fn test_keyword_side_alone_fills_results() {
    let store = store(&corpus()).await;
    store.fail_queries(true);
    let config = RetrievalConfig {
        rerank_enabled: false,
        ..RetrievalConfig::default()
    };
    let retriever = retriever(store, config);

    let outcome = retriever
        .retrieve("防犯カメラ", FusionWeights::default(), 5, None, true)
        .await
        .unwrap();

    let debug = outcome.debug.unwrap();
    assert_eq!(debug.semantic_hits_count, 0);
    assert_eq!(debug.keyword_hits_count, 3);
    assert_eq!(debug.merged_count, 3);
    assert_eq!(outcome.citations.len(), 3);
    assert!(outcome.citations.iter().all(|c| c.quote.contains("防犯カメラ")));
}

#[tokio::test]
async fn test_source_filter_applies_to_both_sides() {
    let store = store(&corpus()).await;
    let retriever = retriever(store, RetrievalConfig::default());
    let filter = SourceFilter::from_sources(["guide.txt"]).unwrap();

    let outcome = retriever
        .retrieve("防犯カメラ", FusionWeights::new(0.7, 0.3), 5, Some(&filter), true)
        .await
        .unwrap();

    assert!(outcome.citations.iter().all(|c| c.source == "guide.txt"));
    let debug = outcome.debug.unwrap();
    assert_eq!(debug.allowed_sources, Some(vec!["guide.txt".to_string()]));
    assert!(debug.semantic_after_filter <= 3);
}

#[tokio::test]
async fn test_empty_collection_returns_nothing() {
    let empty = MockChunkStore::new();
    empty.ensure_collection(DEFAULT_VECTOR_SIZE).await.unwrap();
    let retriever = retriever(Arc::new(empty), RetrievalConfig::default());

    let outcome = retriever
        .retrieve("防犯カメラ", FusionWeights::default(), 5, None, false)
        .await
        .unwrap();

    assert!(outcome.citations.is_empty());
    assert!(outcome.debug.is_none());
}

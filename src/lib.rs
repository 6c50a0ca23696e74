//! quizrag library crate (used by the CLI binary and integration tests).
//!
//! # Public API Surface
//!
//! ## Core Types
//! - [`Config`], [`ConfigError`] - Process configuration
//! - [`Chunk`], [`Citation`], [`SourceFilter`] - Corpus data model
//!
//! ## Retrieval
//! - [`HybridRetriever`] - Vector + keyword search, RRF fusion, cross-encoder gate
//! - [`KeywordIndex`] - In-process lexical search
//! - [`QdrantChunkStore`] - Chunk vectors in Qdrant
//! - [`E5Embedder`], [`Reranker`] - Embedding and reranking models
//!
//! ## Generation
//! - [`Answerer`] - Grounded question answering
//! - [`QuizService`] - Quiz material, generation session and storage
//! - [`GenaiChatClient`] - Chat LLM behind `genai`
//!
//! ## Test/Mock Support
//! Mock implementations are available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod ask;
pub mod config;
pub mod constants;
pub mod corpus;
pub mod embedding;
pub mod hashing;
pub mod llm;
pub mod quiz;
pub mod retrieval;
pub mod search;
pub mod vectordb;

pub use ask::{AskError, AskResponse, Answerer, UNKNOWN_ANSWER};
pub use config::{Config, ConfigError, QuizConfig, RetrievalConfig};
pub use constants::{DimValidationError, validate_embedding_dim};
pub use corpus::{Chunk, ChunkKey, Citation, CorpusError, SourceFilter, load_jsonl, normalize_source};
pub use embedding::{
    CrossEncoder, DevicePreference, E5Config, E5Embedder, EmbedRole, EmbeddingError, Reranker,
    RerankerConfig, RerankerError, TextEmbedder,
};
pub use hashing::{chunk_point_id, hash_to_u64};
pub use llm::{ChatClient, ChatMode, GenaiChatClient, LlmError, Message};
#[cfg(any(test, feature = "mock"))]
pub use llm::MockChatClient;
pub use quiz::{
    ChunkPool, GenerationReport, Level, Orchestrator, QuizError, QuizItem, QuizRequest,
    QuizService, QuizSetResponse, QuizStore, SamplingRetriever, TerminationReason,
};
pub use retrieval::{FusionWeights, HybridRetriever, RetrievalDebug, RetrievalError, RetrievalOutcome};
pub use search::{KeywordIndex, LexicalSearch, SearchError};
#[cfg(any(test, feature = "mock"))]
pub use vectordb::MockChunkStore;
pub use vectordb::{ChunkStore, QdrantChunkStore, VectorDbError};

//! Chunk vector store (Qdrant) and its in-memory test double.

pub mod client;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod model;


pub use client::{ChunkStore, QdrantChunkStore};
pub use error::VectorDbError;
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockChunkStore, cosine_similarity};
pub use model::{ScrollPage, StoredChunk, StoredHit};

pub const DEFAULT_VECTOR_SIZE: u64 = crate::constants::DEFAULT_VECTOR_SIZE_U64;

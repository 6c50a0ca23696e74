use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, Distance, Filter, GetPointsBuilder,
    PointId, PointStruct, ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder,
};
use tracing::debug;

use super::error::VectorDbError;
use super::model::{PAYLOAD_SOURCE, ScrollPage, StoredChunk, StoredHit, chunk_payload, point_id_to_u64};
use crate::corpus::{Chunk, SourceFilter};

#[derive(Clone)]
/// Qdrant-backed chunk store bound to one collection.
pub struct QdrantChunkStore {
    client: Qdrant,
    url: String,
    collection: String,
}

impl std::fmt::Debug for QdrantChunkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantChunkStore")
            .field("url", &self.url)
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

impl QdrantChunkStore {
    /// Creates a client for `url` operating on `collection`.
    pub fn new(url: &str, collection: &str) -> Result<Self, VectorDbError> {
        let client =
            Qdrant::from_url(url)
                .build()
                .map_err(|e| VectorDbError::ConnectionFailed {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;

        Ok(Self {
            client,
            url: url.to_string(),
            collection: collection.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn read_error(&self, e: impl std::fmt::Display) -> VectorDbError {
        VectorDbError::ReadFailed {
            collection: self.collection.clone(),
            message: e.to_string(),
        }
    }

    /// Creates the collection with cosine distance if it does not exist yet.
    pub async fn ensure_collection(&self, vector_size: u64) -> Result<(), VectorDbError> {
        let create_error = |e: qdrant_client::QdrantError| VectorDbError::CreateCollectionFailed {
            collection: self.collection.clone(),
            message: e.to_string(),
        };

        if self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(create_error)?
        {
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine)),
            )
            .await
            .map_err(create_error)?;

        Ok(())
    }

    /// Upserts chunks with their passage vectors (ids derived from chunk identity).
    pub async fn upsert(&self, chunks: &[Chunk], vectors: Vec<Vec<f32>>) -> Result<(), VectorDbError> {
        if chunks.len() != vectors.len() {
            return Err(VectorDbError::BatchMismatch {
                chunks: chunks.len(),
                vectors: vectors.len(),
            });
        }
        if chunks.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                let id = crate::hashing::chunk_point_id(&chunk.key());
                PointStruct::new(id, vector, chunk_payload(chunk))
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(|e| VectorDbError::UpsertFailed {
                collection: self.collection.clone(),
                message: e.to_string(),
            })?;

        Ok(())
    }

    /// Nearest-neighbour query, optionally restricted to exact stored source names.
    pub async fn query(
        &self,
        vector: Vec<f32>,
        k: usize,
        filter: Option<&SourceFilter>,
    ) -> Result<Vec<StoredHit>, VectorDbError> {
        let mut search_builder =
            SearchPointsBuilder::new(&self.collection, vector, k as u64).with_payload(true);

        if let Some(filter) = filter {
            let conditions: Vec<Condition> = filter
                .sources()
                .iter()
                .map(|s| Condition::matches(PAYLOAD_SOURCE, s.clone()))
                .collect();
            search_builder = search_builder.filter(Filter::should(conditions));
        }

        let response = self
            .client
            .search_points(search_builder)
            .await
            .map_err(|e| VectorDbError::SearchFailed {
                collection: self.collection.clone(),
                message: e.to_string(),
            })?;

        Ok(response
            .result
            .into_iter()
            .filter_map(StoredHit::from_scored_point)
            .collect())
    }

    /// Fetches chunk bodies by id. Unknown ids are silently skipped.
    pub async fn get(&self, ids: &[u64]) -> Result<Vec<StoredChunk>, VectorDbError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let point_ids: Vec<PointId> = ids.iter().map(|&id| id.into()).collect();
        let response = self
            .client
            .get_points(GetPointsBuilder::new(&self.collection, point_ids).with_payload(true))
            .await
            .map_err(|e| self.read_error(e))?;

        Ok(response
            .result
            .into_iter()
            .filter_map(StoredChunk::from_retrieved_point)
            .collect())
    }

    /// Reads one page of the collection in id order.
    pub async fn scroll(&self, offset: Option<u64>, limit: usize) -> Result<ScrollPage, VectorDbError> {
        let mut builder = ScrollPointsBuilder::new(&self.collection)
            .limit(limit as u32)
            .with_payload(true)
            .with_vectors(false);
        if let Some(offset) = offset {
            builder = builder.offset(PointId::from(offset));
        }

        let response = self
            .client
            .scroll(builder)
            .await
            .map_err(|e| self.read_error(e))?;

        let chunks: Vec<StoredChunk> = response
            .result
            .into_iter()
            .filter_map(StoredChunk::from_retrieved_point)
            .collect();

        debug!(
            collection = %self.collection,
            fetched = chunks.len(),
            "Scrolled chunk page"
        );

        Ok(ScrollPage {
            chunks,
            next_offset: point_id_to_u64(response.next_page_offset),
        })
    }

    /// Exact number of indexed chunks.
    pub async fn count(&self) -> Result<u64, VectorDbError> {
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await
            .map_err(|e| self.read_error(e))?;

        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }
}

/// Vector store interface consumed by retrieval and the chunk pool.
pub trait ChunkStore: Send + Sync {
    /// Ensures the backing collection exists.
    fn ensure_collection(
        &self,
        vector_size: u64,
    ) -> impl std::future::Future<Output = Result<(), VectorDbError>> + Send;

    /// Writes chunks and their vectors.
    fn upsert(
        &self,
        chunks: &[Chunk],
        vectors: Vec<Vec<f32>>,
    ) -> impl std::future::Future<Output = Result<(), VectorDbError>> + Send;

    /// Returns up to `k` hits ranked by similarity.
    fn query(
        &self,
        vector: Vec<f32>,
        k: usize,
        filter: Option<&SourceFilter>,
    ) -> impl std::future::Future<Output = Result<Vec<StoredHit>, VectorDbError>> + Send;

    /// Fetches chunk bodies by id.
    fn get(
        &self,
        ids: &[u64],
    ) -> impl std::future::Future<Output = Result<Vec<StoredChunk>, VectorDbError>> + Send;

    /// Reads one page of the whole collection.
    fn scroll(
        &self,
        offset: Option<u64>,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<ScrollPage, VectorDbError>> + Send;

    /// Number of indexed chunks.
    fn count(&self) -> impl std::future::Future<Output = Result<u64, VectorDbError>> + Send;
}

impl ChunkStore for QdrantChunkStore {
    async fn ensure_collection(&self, vector_size: u64) -> Result<(), VectorDbError> {
        self.ensure_collection(vector_size).await
    }

    async fn upsert(&self, chunks: &[Chunk], vectors: Vec<Vec<f32>>) -> Result<(), VectorDbError> {
        self.upsert(chunks, vectors).await
    }

    async fn query(
        &self,
        vector: Vec<f32>,
        k: usize,
        filter: Option<&SourceFilter>,
    ) -> Result<Vec<StoredHit>, VectorDbError> {
        self.query(vector, k, filter).await
    }

    async fn get(&self, ids: &[u64]) -> Result<Vec<StoredChunk>, VectorDbError> {
        self.get(ids).await
    }

    async fn scroll(&self, offset: Option<u64>, limit: usize) -> Result<ScrollPage, VectorDbError> {
        self.scroll(offset, limit).await
    }

    async fn count(&self) -> Result<u64, VectorDbError> {
        self.count().await
    }
}

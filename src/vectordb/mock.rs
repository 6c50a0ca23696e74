use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::corpus::{Chunk, SourceFilter};
use crate::hashing::chunk_point_id;
use crate::vectordb::{ChunkStore, ScrollPage, StoredChunk, StoredHit, VectorDbError};

const MOCK_COLLECTION: &str = "mock";

/// In-memory [`ChunkStore`] with brute-force cosine search.
#[derive(Default)]
pub struct MockChunkStore {
    vector_size: std::sync::RwLock<Option<u64>>,
    points: std::sync::RwLock<BTreeMap<u64, MockStoredPoint>>,
    fail_queries: AtomicBool,
    fail_reads: AtomicBool,
}

#[derive(Clone)]
struct MockStoredPoint {
    vector: Vec<f32>,
    chunk: Chunk,
}

impl MockChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn point_count(&self) -> usize {
        self.points.read().map(|p| p.len()).unwrap_or(0)
    }

    /// Makes every subsequent `query` fail.
    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent `get`/`scroll`/`count` fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn check_reads(&self) -> Result<(), VectorDbError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(VectorDbError::ReadFailed {
                collection: MOCK_COLLECTION.to_string(),
                message: "injected read failure".to_string(),
            });
        }
        Ok(())
    }

    fn poisoned(message: &str) -> VectorDbError {
        VectorDbError::ReadFailed {
            collection: MOCK_COLLECTION.to_string(),
            message: format!("lock poisoned: {message}"),
        }
    }
}

impl ChunkStore for MockChunkStore {
    async fn ensure_collection(&self, vector_size: u64) -> Result<(), VectorDbError> {
        let mut size = self
            .vector_size
            .write()
            .map_err(|_| VectorDbError::CreateCollectionFailed {
                collection: MOCK_COLLECTION.to_string(),
                message: "lock poisoned".to_string(),
            })?;
        size.get_or_insert(vector_size);
        Ok(())
    }

    async fn upsert(&self, chunks: &[Chunk], vectors: Vec<Vec<f32>>) -> Result<(), VectorDbError> {
        if chunks.len() != vectors.len() {
            return Err(VectorDbError::BatchMismatch {
                chunks: chunks.len(),
                vectors: vectors.len(),
            });
        }

        let expected = self
            .vector_size
            .read()
            .map_err(|_| Self::poisoned("vector_size"))?
            .ok_or_else(|| VectorDbError::CollectionNotFound {
                collection: MOCK_COLLECTION.to_string(),
            })?;

        let mut points = self
            .points
            .write()
            .map_err(|_| VectorDbError::UpsertFailed {
                collection: MOCK_COLLECTION.to_string(),
                message: "lock poisoned".to_string(),
            })?;

        for (chunk, vector) in chunks.iter().zip(vectors) {
            if vector.len() as u64 != expected {
                return Err(VectorDbError::InvalidDimension {
                    expected: expected as usize,
                    actual: vector.len(),
                });
            }
            points.insert(
                chunk_point_id(&chunk.key()),
                MockStoredPoint {
                    vector,
                    chunk: chunk.clone(),
                },
            );
        }

        Ok(())
    }

    async fn query(
        &self,
        vector: Vec<f32>,
        k: usize,
        filter: Option<&SourceFilter>,
    ) -> Result<Vec<StoredHit>, VectorDbError> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(VectorDbError::SearchFailed {
                collection: MOCK_COLLECTION.to_string(),
                message: "injected query failure".to_string(),
            });
        }

        let points = self.points.read().map_err(|_| Self::poisoned("points"))?;

        let mut hits: Vec<StoredHit> = points
            .iter()
            .filter(|(_, p)| filter.is_none_or(|f| f.allows(&p.chunk.source)))
            .map(|(&id, p)| StoredHit {
                id,
                score: cosine_similarity(&vector, &p.vector),
                chunk: p.chunk.clone(),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn get(&self, ids: &[u64]) -> Result<Vec<StoredChunk>, VectorDbError> {
        self.check_reads()?;
        let points = self.points.read().map_err(|_| Self::poisoned("points"))?;
        Ok(ids
            .iter()
            .filter_map(|id| {
                points.get(id).map(|p| StoredChunk {
                    id: *id,
                    chunk: p.chunk.clone(),
                })
            })
            .collect())
    }

    async fn scroll(&self, offset: Option<u64>, limit: usize) -> Result<ScrollPage, VectorDbError> {
        self.check_reads()?;
        let points = self.points.read().map_err(|_| Self::poisoned("points"))?;

        let mut iter = points.range(offset.unwrap_or(0)..);
        let chunks: Vec<StoredChunk> = iter
            .by_ref()
            .take(limit)
            .map(|(&id, p)| StoredChunk {
                id,
                chunk: p.chunk.clone(),
            })
            .collect();
        let next_offset = iter.next().map(|(&id, _)| id);

        Ok(ScrollPage {
            chunks,
            next_offset,
        })
    }

    async fn count(&self) -> Result<u64, VectorDbError> {
        self.check_reads()?;
        Ok(self.point_count() as u64)
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}

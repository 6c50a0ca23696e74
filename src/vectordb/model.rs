use std::collections::HashMap;

use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::{PointId, RetrievedPoint, ScoredPoint, Value};

use crate::corpus::Chunk;
use crate::hashing::chunk_point_id;

/// A chunk together with its store id.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredChunk {
    pub id: u64,
    pub chunk: Chunk,
}

impl StoredChunk {
    pub fn new(chunk: Chunk) -> Self {
        Self {
            id: chunk_point_id(&chunk.key()),
            chunk,
        }
    }
}

/// One semantic search result. `score` is cosine similarity (higher is closer).
#[derive(Debug, Clone, PartialEq)]
pub struct StoredHit {
    pub id: u64,
    pub score: f32,
    pub chunk: Chunk,
}

/// One page of a full-collection scroll.
#[derive(Debug, Clone, Default)]
pub struct ScrollPage {
    pub chunks: Vec<StoredChunk>,
    /// Offset to pass to the next call; `None` once the collection is exhausted.
    pub next_offset: Option<u64>,
}

pub(crate) const PAYLOAD_SOURCE: &str = "source";
pub(crate) const PAYLOAD_PAGE: &str = "page";
pub(crate) const PAYLOAD_CHUNK_INDEX: &str = "chunk_index";
pub(crate) const PAYLOAD_TEXT: &str = "text";

pub(crate) fn chunk_payload(chunk: &Chunk) -> HashMap<String, Value> {
    let mut payload: HashMap<String, Value> = HashMap::new();
    payload.insert(PAYLOAD_SOURCE.to_string(), chunk.source.clone().into());
    // Absent pages are stored as 0 so the field keeps a single type.
    payload.insert(
        PAYLOAD_PAGE.to_string(),
        i64::from(chunk.page.unwrap_or(0)).into(),
    );
    payload.insert(
        PAYLOAD_CHUNK_INDEX.to_string(),
        i64::from(chunk.chunk_index).into(),
    );
    payload.insert(PAYLOAD_TEXT.to_string(), chunk.text.clone().into());
    payload
}

pub(crate) fn chunk_from_payload(payload: &HashMap<String, Value>) -> Option<Chunk> {
    let text = payload.get(PAYLOAD_TEXT)?.as_str()?.to_string();

    let source = payload
        .get(PAYLOAD_SOURCE)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_default();

    let page = payload
        .get(PAYLOAD_PAGE)
        .and_then(|v| v.as_integer())
        .and_then(|p| u32::try_from(p).ok())
        .filter(|p| *p > 0);

    let chunk_index = payload
        .get(PAYLOAD_CHUNK_INDEX)
        .and_then(|v| v.as_integer())
        .and_then(|i| u32::try_from(i).ok())
        .unwrap_or(0);

    Some(Chunk {
        source,
        page,
        chunk_index,
        text,
    })
}

pub(crate) fn point_id_to_u64(id: Option<PointId>) -> Option<u64> {
    match id.and_then(|pid| pid.point_id_options) {
        Some(PointIdOptions::Num(n)) => Some(n),
        _ => None,
    }
}

impl StoredHit {
    pub(crate) fn from_scored_point(point: ScoredPoint) -> Option<Self> {
        let id = point_id_to_u64(point.id)?;
        let chunk = chunk_from_payload(&point.payload)?;
        Some(Self {
            id,
            score: point.score,
            chunk,
        })
    }
}

impl StoredChunk {
    pub(crate) fn from_retrieved_point(point: RetrievedPoint) -> Option<Self> {
        let id = point_id_to_u64(point.id)?;
        let chunk = chunk_from_payload(&point.payload)?;
        Some(Self { id, chunk })
    }
}

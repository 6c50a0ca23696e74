//! BLAKE3-based identifiers for indexed chunks.

use blake3::Hasher;

use crate::corpus::ChunkKey;

/// Computes a 64-bit hash of the input data using BLAKE3, truncated from 256 bits.
///
/// A corpus of manuals holds at most tens of thousands of chunks, so the
/// birthday bound of a 64-bit id (~4.3 billion items) is far out of reach.
#[inline]
pub fn hash_to_u64(data: &[u8]) -> u64 {
    finalize_u64(blake3::hash(data))
}

/// Stable vector-store point id for a chunk.
///
/// Re-indexing the same `(source, page, chunk_index)` overwrites the point
/// instead of duplicating it. The source is hashed in NFC form.
#[inline]
pub fn chunk_point_id(key: &ChunkKey) -> u64 {
    let mut hasher = Hasher::new();
    hasher.update(crate::corpus::normalize_source(&key.source).as_bytes());
    hasher.update(b"|");
    match key.page {
        Some(page) => hasher.update(&page.to_le_bytes()),
        None => hasher.update(b"-"),
    };
    hasher.update(b"|");
    hasher.update(&key.chunk_index.to_le_bytes());

    finalize_u64(hasher.finalize())
}

#[inline]
fn finalize_u64(hash: blake3::Hash) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

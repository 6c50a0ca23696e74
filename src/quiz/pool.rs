use std::collections::BTreeMap;
use std::sync::Arc;

use rand::Rng;
use rand::seq::SliceRandom;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::QuizConfig;
use crate::corpus::normalize_source;
use crate::vectordb::{ChunkStore, VectorDbError};

/// NFC source name -> chunk ids, at most `max_ids_per_source` per source.
pub type SourcePool = BTreeMap<String, Vec<u64>>;

/// Lazily built per-source index of chunk ids, used to sample quiz material
/// without relevance search.
///
/// The first [`ChunkPool::get`] scrolls the whole store; later calls return
/// the cached snapshot. Build and lookup share one lock, so concurrent first
/// calls build once.
pub struct ChunkPool<S> {
    store: Arc<S>,
    max_ids_per_source: usize,
    batch_size: usize,
    cache: Mutex<Option<Arc<SourcePool>>>,
}

impl<S> std::fmt::Debug for ChunkPool<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkPool")
            .field("max_ids_per_source", &self.max_ids_per_source)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl<S: ChunkStore> ChunkPool<S> {
    pub fn new(store: Arc<S>, max_ids_per_source: usize, batch_size: usize) -> Self {
        Self {
            store,
            max_ids_per_source: max_ids_per_source.max(1),
            batch_size: batch_size.max(1),
            cache: Mutex::new(None),
        }
    }

    pub fn from_config(store: Arc<S>, config: &QuizConfig) -> Self {
        Self::new(store, config.pool_max_ids_per_source, config.pool_batch_size)
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the cached pool, building it on first use.
    pub async fn get(&self) -> Arc<SourcePool> {
        self.get_or_build(false).await
    }

    /// Discards the cached pool and builds a fresh one.
    pub async fn rebuild(&self) -> Arc<SourcePool> {
        self.get_or_build(true).await
    }

    async fn get_or_build(&self, force_rebuild: bool) -> Arc<SourcePool> {
        let mut cache = self.cache.lock().await;
        if !force_rebuild && let Some(pool) = cache.as_ref() {
            return Arc::clone(pool);
        }

        match self.build().await {
            Ok(pool) => {
                let pool = Arc::new(pool);
                *cache = Some(Arc::clone(&pool));
                pool
            }
            Err(e) => {
                // Not cached, so the next call retries the build.
                error!(error = %e, "Chunk pool build failed");
                Arc::new(SourcePool::new())
            }
        }
    }

    async fn build(&self) -> Result<SourcePool, VectorDbError> {
        let total = self.store.count().await?;
        if total == 0 {
            warn!("Chunk pool build found an empty collection");
            return Ok(SourcePool::new());
        }

        info!(total, batch_size = self.batch_size, "Building chunk pool");

        let mut pool = SourcePool::new();
        let mut offset = None;
        let mut seen = 0usize;
        loop {
            let page = self.store.scroll(offset, self.batch_size).await?;
            if page.chunks.is_empty() {
                break;
            }
            seen += page.chunks.len();
            for stored in page.chunks {
                let ids = pool.entry(stored.chunk.normalized_source()).or_default();
                if ids.len() < self.max_ids_per_source {
                    ids.push(stored.id);
                }
            }
            debug!(seen, total, "Chunk pool batch processed");

            match page.next_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        let sizes: Vec<(&str, usize)> = pool.iter().map(|(s, ids)| (s.as_str(), ids.len())).collect();
        info!(sources = pool.len(), total = seen, distribution = ?sizes, "Chunk pool built");
        Ok(pool)
    }
}

/// Chunk ids pooled for `source` (compared after NFC normalization).
pub fn ids_for_source<'a>(pool: &'a SourcePool, source: &str) -> &'a [u64] {
    match pool.get(&normalize_source(source)) {
        Some(ids) => ids,
        None => {
            warn!(source, "Source not present in chunk pool");
            &[]
        }
    }
}

/// Draws up to `n` distinct ids spread as evenly as possible over `sources`
/// (all pooled sources when `None`). The remainder of the split goes to the
/// first sources. Unknown sources are skipped; if none is known the result
/// is empty rather than falling back to other sources.
pub fn sample_multi_source<R: Rng + ?Sized>(
    pool: &SourcePool,
    sources: Option<&[String]>,
    n: usize,
    rng: &mut R,
) -> Vec<u64> {
    let targets: Vec<&str> = match sources {
        Some(sources) if !sources.is_empty() => sources
            .iter()
            .map(|s| normalize_source(s))
            .filter_map(|norm| match pool.get_key_value(&norm) {
                Some((key, _)) => Some(key.as_str()),
                None => {
                    error!(source = %norm, "Requested source is not in the chunk pool");
                    None
                }
            })
            .collect(),
        _ => pool.keys().map(String::as_str).collect(),
    };

    if targets.is_empty() || n == 0 {
        return Vec::new();
    }

    let per_source = (n / targets.len()).max(1);
    let remainder = n % targets.len();

    let mut sampled = Vec::with_capacity(n);
    for (i, source) in targets.iter().enumerate() {
        let want = per_source + usize::from(i < remainder);
        let ids = ids_for_source(pool, source);
        if ids.is_empty() {
            continue;
        }
        sampled.extend(ids.choose_multiple(rng, want.min(ids.len())).copied());
    }

    if sampled.len() > n {
        sampled.shuffle(rng);
        sampled.truncate(n);
    }
    sampled
}

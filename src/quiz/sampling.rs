use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use super::error::QuizError;
use super::model::Level;
use super::pool::{ChunkPool, SourcePool, ids_for_source, sample_multi_source};
use super::selector::select_chunks;
use crate::config::QuizConfig;
use crate::corpus::{Chunk, Citation, CitationKey, citation_key, normalize_source};
use crate::vectordb::ChunkStore;

/// Re-samples (with a doubled draw) while fewer than `citations_min` citations were found.
pub const MAX_SAMPLING_RETRIES: usize = 2;

/// Diagnostics of one sampling retrieval.
#[derive(Debug, Clone, Serialize)]
pub struct SamplingDebug {
    pub quiz_pool_sources: Vec<String>,
    pub quiz_pool_size: usize,
    pub quiz_sample_n: usize,
    pub quiz_selected_n: usize,
    pub quiz_final_citations_count: usize,
    pub quiz_level: Level,
    pub quiz_level_rules: String,
    pub quiz_sources_unique: Vec<String>,
    pub quiz_retrieval_retry_count: usize,
}

#[derive(Debug, Clone)]
pub struct SamplingOutcome {
    pub citations: Vec<Citation>,
    pub debug: SamplingDebug,
}

/// Quiz material by stratified random sampling from the [`ChunkPool`].
///
/// Abstract quiz topics often match nothing in a relevance search, so this
/// path samples chunk ids from the requested source, ranks the fetched bodies
/// with the level heuristics in [`super::selector`] and turns the best ones
/// into citations. Always restricted to exactly one source.
pub struct SamplingRetriever<S> {
    pool: Arc<ChunkPool<S>>,
    config: QuizConfig,
}

impl<S> std::fmt::Debug for SamplingRetriever<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamplingRetriever")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Accumulates deduplicated citations from one source.
struct CitationCollector {
    target: String,
    quote_max_len: usize,
    seen: HashSet<CitationKey>,
    citations: Vec<Citation>,
}

impl CitationCollector {
    fn new(target: String, quote_max_len: usize) -> Self {
        Self {
            target,
            quote_max_len,
            seen: HashSet::new(),
            citations: Vec::new(),
        }
    }

    /// Adds `chunks` in order until `limit` citations are held.
    fn extend(&mut self, chunks: &[Chunk], limit: Option<usize>) {
        for chunk in chunks {
            if limit.is_some_and(|limit| self.citations.len() >= limit) {
                break;
            }
            if chunk.normalized_source() != self.target {
                error!(
                    source = %chunk.source,
                    target = %self.target,
                    "Selected chunk does not belong to the requested source"
                );
                continue;
            }
            if self.seen.insert(citation_key(&chunk.source, chunk.page, &chunk.text)) {
                self.citations.push(chunk.to_citation(self.quote_max_len));
            }
        }
    }
}

impl<S: ChunkStore> SamplingRetriever<S> {
    pub fn new(pool: Arc<ChunkPool<S>>, config: QuizConfig) -> Self {
        Self { pool, config }
    }

    pub fn pool(&self) -> &Arc<ChunkPool<S>> {
        &self.pool
    }

    /// Samples citations for `count` quiz items of `level` from the single
    /// source in `sources`.
    #[instrument(skip(self, sources), fields(level = %level, count = count))]
    pub async fn retrieve(
        &self,
        sources: &[String],
        level: Level,
        count: usize,
    ) -> Result<SamplingOutcome, QuizError> {
        let target = match sources {
            [] => return Err(QuizError::SourceRequired),
            [single] => normalize_source(single),
            many => return Err(QuizError::MultipleSources { count: many.len() }),
        };

        let pool = self.pool.get().await;
        if pool.is_empty() {
            error!("Chunk pool is empty");
            return Err(QuizError::PoolEmpty);
        }

        let targets = vec![target.clone()];
        let mut sample_n = (count * self.config.sample_multiplier).max(self.config.sample_min_n);
        let citations_min = self.config.citations_min;
        let select_n = (citations_min * 2).max(count * 2);

        let sampled = sample_multi_source(&pool, Some(&targets), sample_n, &mut rand::thread_rng());
        if sampled.is_empty() {
            error!(source = %target, "No chunk ids sampled for source");
            return Err(QuizError::SourceNotFound { source_name: target });
        }
        info!(sampled = sampled.len(), source = %target, "Chunk ids sampled");

        let fetched = self.fetch_for_source(&sampled, &target).await?;
        if fetched.is_empty() {
            error!(source = %target, "No fetched chunk matches the requested source");
            return Err(QuizError::SourceNotFound { source_name: target });
        }

        let mut selected = select_chunks(fetched, level, select_n);
        let mut collector = CitationCollector::new(target.clone(), self.config.quote_max_len);
        collector.extend(&selected, None);

        let mut retry_count = 0;
        while collector.citations.len() < citations_min && retry_count < MAX_SAMPLING_RETRIES {
            retry_count += 1;
            sample_n *= 2;
            warn!(
                have = collector.citations.len(),
                citations_min, retry_count, sample_n, "Not enough citations, resampling"
            );

            let sampled = sample_multi_source(&pool, Some(&targets), sample_n, &mut rand::thread_rng());
            if sampled.is_empty() {
                break;
            }
            let fetched = match self.fetch_for_source(&sampled, &target).await {
                Ok(fetched) if !fetched.is_empty() => fetched,
                Ok(_) => break,
                Err(e) => {
                    error!(error = %e, "Resample fetch failed");
                    break;
                }
            };
            selected = select_chunks(fetched, level, select_n * 2);
            collector.extend(&selected, Some(citations_min));
        }

        let citations = collector.citations;
        let sources_unique: Vec<String> = {
            let mut s: Vec<String> = citations.iter().map(|c| c.source.clone()).collect();
            s.sort();
            s.dedup();
            s
        };
        if sources_unique.len() > 1 {
            error!(sources = ?sources_unique, expected = %target, "Citations span several sources");
        }

        info!(
            citations = citations.len(),
            retry_count,
            source = %target,
            "Sampling retrieval finished"
        );

        let debug = SamplingDebug {
            quiz_pool_sources: pooled_sources(&pool, &targets),
            quiz_pool_size: targets.iter().map(|s| ids_for_source(&pool, s).len()).sum(),
            quiz_sample_n: sample_n,
            quiz_selected_n: selected.len(),
            quiz_final_citations_count: citations.len(),
            quiz_level: level,
            quiz_level_rules: format!("{level}_keywords"),
            quiz_sources_unique: sources_unique,
            quiz_retrieval_retry_count: retry_count,
        };

        Ok(SamplingOutcome { citations, debug })
    }

    /// Fetches `ids` and drops any chunk from another source.
    async fn fetch_for_source(&self, ids: &[u64], target: &str) -> Result<Vec<Chunk>, QuizError> {
        let stored = self.pool.store().get(ids).await?;
        let total = stored.len();
        let chunks: Vec<Chunk> = stored
            .into_iter()
            .map(|s| s.chunk)
            .filter(|c| c.normalized_source() == target)
            .collect();
        if chunks.len() < total {
            error!(
                dropped = total - chunks.len(),
                target, "Fetched chunks from another source; pool and store disagree"
            );
        }
        Ok(chunks)
    }
}

fn pooled_sources(pool: &SourcePool, targets: &[String]) -> Vec<String> {
    targets
        .iter()
        .filter(|s| pool.contains_key(s.as_str()))
        .cloned()
        .collect()
}

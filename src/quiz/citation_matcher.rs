use std::sync::Arc;

use tracing::{debug, warn};

use crate::corpus::{Citation, SourceFilter};
use crate::retrieval::{FusionWeights, HybridRetriever};
use crate::vectordb::ChunkStore;

/// Citations attached to a statement that came back without any.
pub const MATCHED_CITATIONS: usize = 3;

/// Finds supporting citations for a statement with an evenly weighted
/// hybrid search.
pub struct CitationMatcher<S> {
    retriever: Arc<HybridRetriever<S>>,
}

impl<S> std::fmt::Debug for CitationMatcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CitationMatcher").finish_non_exhaustive()
    }
}

impl<S: ChunkStore> CitationMatcher<S> {
    pub fn new(retriever: Arc<HybridRetriever<S>>) -> Self {
        Self { retriever }
    }

    /// Up to three citations for `statement`. Empty for a blank statement or
    /// when retrieval fails.
    pub async fn citations_for(&self, statement: &str, filter: Option<&SourceFilter>) -> Vec<Citation> {
        if statement.trim().is_empty() {
            return Vec::new();
        }
        match self
            .retriever
            .retrieve(statement, FusionWeights::new(0.5, 0.5), MATCHED_CITATIONS, filter, false)
            .await
        {
            Ok(outcome) => {
                debug!(found = outcome.citations.len(), "Matched citations for statement");
                outcome.citations
            }
            Err(e) => {
                warn!(error = %e, "Citation matching failed");
                Vec::new()
            }
        }
    }
}

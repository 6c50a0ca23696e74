//! Hybrid retrieval for grounding citations.
//!
//! Pipeline:
//! 1. Size the candidate pool from the indexed chunk count ([`sizing`]).
//! 2. Fetch `candidate_k` chunks from vector search and from keyword search,
//!    each post-filtered by source. Either side may fail and come back empty.
//! 3. Fuse both rankings with RRF ([`RankFusion`]).
//! 4. Send the first `rerank_n` fused entries to the cross-encoder and keep the
//!    ones that clear the absolute floor and the gap to the best score
//!    ([`RerankGate`]). If the cross-encoder fails, fall back to fused order.

pub mod debug;
mod error;
pub mod fusion;
pub mod gate;
pub mod hybrid;
pub mod sizing;


pub use debug::{PostRerankEntry, PreRerankEntry, RetrievalDebug};
pub use error::RetrievalError;
pub use fusion::{FusedCandidate, FusionWeights, RankFusion};
pub use gate::{GateSelection, QuizCandidate, RerankGate, RerankedCandidate};
pub use hybrid::{HybridRetriever, RetrievalOutcome};
pub use sizing::{candidate_k, rerank_n, scaled_count};

// RAG (Retrieval-Augmented Generation) Pipeline
//
// This module turns a user question into a grounded answer:
//
// - Query Expander: translate + diversify the question into retrieval queries
// - Retriever: fan queries out to the vector store, dedup and aggregate
// - Reranking Stage: cross-encoder reordering with similarity fallback
// - Answer Synthesizer: persona prompt assembly and generation
// - Pipeline: end-to-end orchestration

pub mod expansion;
pub mod pipeline;
pub mod reranking;
pub mod retrieval;
pub mod scorer;
pub mod synthesis;

// Re-export key types
pub use expansion::QueryExpander;
pub use pipeline::{RagAnswer, RagPipeline};
pub use reranking::{RerankStage, ScoredChunk};
pub use retrieval::Retriever;
pub use scorer::{CrossEncoderScorer, RelevanceScorer};
pub use synthesis::{AnswerSynthesizer, CONTEXT_SEPARATOR};

use serde::{Deserialize, Serialize};

/// Pipeline stage that degraded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Expansion,
    Retrieval,
    Reranking,
    Synthesis,
}

/// Record of a swallowed failure
///
/// Stages never raise to their caller; they fall back and note what
/// happened here so programmatic callers can tell "succeeded" from
/// "gracefully degraded" without parsing log output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Degradation {
    pub stage: Stage,
    pub reason: String,
}

impl Degradation {
    pub fn new(stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            reason: reason.into(),
        }
    }
}

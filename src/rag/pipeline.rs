//! End-to-end RAG pipeline
//!
//! Orchestrates expand -> retrieve -> rerank -> synthesize. The
//! pipeline holds no per-call state; everything a caller might want to
//! persist (the answer, the context it was grounded in, degradation
//! records) travels in the returned [`RagAnswer`], so one instance is
//! safe to share across concurrent requests.

use crate::clients::{Embedder, TextGenerator};
use crate::config::PipelineConfig;
use crate::persona::Persona;
use crate::rag::expansion::QueryExpander;
use crate::rag::reranking::RerankStage;
use crate::rag::retrieval::Retriever;
use crate::rag::scorer::RelevanceScorer;
use crate::rag::synthesis::AnswerSynthesizer;
use crate::rag::Degradation;
use crate::store::VectorStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Result of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagAnswer {
    /// Final user-facing answer text
    pub answer: String,
    /// Context block the answer was grounded in, empty when retrieval
    /// found nothing
    pub context_used: String,
    /// Stages that fell back during this run
    pub degradations: Vec<Degradation>,
}

/// Multi-stage retrieval and answer engine
pub struct RagPipeline {
    expander: QueryExpander,
    retriever: Retriever,
    reranker: RerankStage,
    synthesizer: AnswerSynthesizer,
    config: PipelineConfig,
}

impl RagPipeline {
    /// Assemble a pipeline from its collaborators.
    ///
    /// `scorer` is optional; without it the reranking stage degrades to
    /// vector-distance ordering.
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        scorer: Option<Arc<dyn RelevanceScorer>>,
        persona: Persona,
        config: PipelineConfig,
    ) -> Self {
        Self {
            expander: QueryExpander::new(generator.clone(), config.max_queries),
            retriever: Retriever::new(embedder, store, config.fingerprint_prefix),
            reranker: RerankStage::new(scorer, generator.clone(), config.low_confidence_threshold),
            synthesizer: AnswerSynthesizer::new(generator, persona),
            config,
        }
    }

    /// Answer one question, optionally with prior conversation turns.
    ///
    /// Never returns an error: upstream failures degrade per stage and
    /// are reported in `RagAnswer::degradations`.
    pub async fn answer(&self, query: &str, conversation_history: &str) -> RagAnswer {
        let mut degradations = Vec::new();

        info!(query_chars = query.len(), "pipeline run started");

        let queries = self.expander.expand(query, &mut degradations).await;

        let chunks = self
            .retriever
            .retrieve(&queries, self.config.per_query_limit, &mut degradations)
            .await;

        if chunks.is_empty() {
            debug!("retrieval produced no documents, short-circuiting");
            return RagAnswer {
                answer: self.synthesizer.no_context_message().to_string(),
                context_used: String::new(),
                degradations,
            };
        }

        let final_documents = if self.reranker.has_scorer() {
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            self.reranker
                .rerank(query, &texts, self.config.final_top_k, &mut degradations)
                .await
                .into_iter()
                .map(|scored| scored.text)
                .collect()
        } else {
            // No reranker: vector distance ascending decides
            let mut by_distance = chunks;
            by_distance.sort_by(|a, b| {
                a.distance
                    .partial_cmp(&b.distance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            by_distance
                .into_iter()
                .take(self.config.final_top_k)
                .map(|c| c.text)
                .collect::<Vec<String>>()
        };

        let context = AnswerSynthesizer::assemble_context(&final_documents);
        debug!(
            documents = final_documents.len(),
            context_chars = context.len(),
            "context assembled"
        );

        let answer = self
            .synthesizer
            .synthesize(query, conversation_history, &context, &mut degradations)
            .await;

        info!(
            degradations = degradations.len(),
            "pipeline run finished"
        );

        RagAnswer {
            answer,
            context_used: context,
            degradations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{EmbeddingTask, GenerationParams};
    use crate::errors::Result;
    use crate::store::RetrievedChunk;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubGenerator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextGenerator for StubGenerator {
        async fn generate(&self, _prompt: &str, _params: GenerationParams) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("stub output".to_string())
        }
    }

    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, _text: &str, _task: EmbeddingTask) -> Result<Vec<f32>> {
            Ok(vec![0.1, 0.2, 0.3])
        }
    }

    struct EmptyStore;

    #[async_trait]
    impl VectorStore for EmptyStore {
        async fn query(&self, _embedding: &[f32], _n: usize) -> Result<Vec<RetrievedChunk>> {
            Ok(Vec::new())
        }

        async fn count(&self) -> Result<u64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_empty_retrieval_short_circuits_without_generation_calls() {
        let generator = Arc::new(StubGenerator {
            calls: AtomicUsize::new(0),
        });
        let pipeline = RagPipeline::new(
            generator.clone(),
            Arc::new(StubEmbedder),
            Arc::new(EmptyStore),
            None,
            Persona::default(),
            PipelineConfig::default(),
        );

        let result = pipeline.answer("any question", "").await;

        assert_eq!(result.answer, Persona::default().no_context_message);
        assert!(result.context_used.is_empty());
        // Expansion made calls, but synthesis must not have run:
        // the two expansion calls are the only ones
        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
    }
}

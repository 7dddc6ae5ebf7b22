//! Reranking stage
//!
//! Reorders the aggregated retrieval results with a cross-encoder.
//! Every failure path falls back to the input order, which is assumed
//! distance-sorted or aggregation-ordered, so the stage never fails.

use crate::clients::{GenerationParams, TextGenerator};
use crate::rag::scorer::RelevanceScorer;
use crate::rag::{Degradation, Stage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

const TRANSLATE_PARAMS: GenerationParams = GenerationParams {
    temperature: 0.3,
    max_output_tokens: 100,
};

/// Documents are truncated to this many characters before scoring
const SCORING_DOC_CHARS: usize = 400;

/// How many top candidates the low-confidence guard inspects
const LOW_CONFIDENCE_WINDOW: usize = 3;

/// A document paired with its relevance score.
///
/// The score is a cross-encoder logit when reranking ran, or the
/// positional index in the fallback paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub text: String,
    pub score: f32,
}

/// Cross-encoder reranking with similarity-order fallback
pub struct RerankStage {
    scorer: Option<Arc<dyn RelevanceScorer>>,
    generator: Arc<dyn TextGenerator>,
    /// Scores below this for all inspected top candidates mean the
    /// model has no confidence and its order is discarded
    low_confidence_threshold: f32,
}

impl RerankStage {
    pub fn new(
        scorer: Option<Arc<dyn RelevanceScorer>>,
        generator: Arc<dyn TextGenerator>,
        low_confidence_threshold: f32,
    ) -> Self {
        Self {
            scorer,
            generator,
            low_confidence_threshold,
        }
    }

    pub fn has_scorer(&self) -> bool {
        self.scorer.is_some()
    }

    /// Rerank `documents` for `query`, returning at most `top_k` entries.
    ///
    /// Without a scorer, with empty input, on scoring failure, or when
    /// the model is low-confidence, the first `top_k` documents come
    /// back in input order with positional pseudo-scores.
    pub async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_k: usize,
        degradations: &mut Vec<Degradation>,
    ) -> Vec<ScoredChunk> {
        let scorer = match &self.scorer {
            Some(scorer) if !documents.is_empty() => scorer,
            _ => return positional_order(documents, top_k),
        };

        debug!(documents = documents.len(), "reranking documents");

        let scoring_query = self.query_for_scoring(query, degradations).await;

        let pairs: Vec<(String, String)> = documents
            .iter()
            .map(|doc| {
                let truncated: String = doc.chars().take(SCORING_DOC_CHARS).collect();
                (scoring_query.clone(), truncated)
            })
            .collect();

        let scores = match scorer.predict(&pairs) {
            Ok(scores) if scores.len() == documents.len() => scores,
            Ok(_) => {
                warn!("scorer returned wrong number of scores, using similarity order");
                degradations.push(Degradation::new(
                    Stage::Reranking,
                    "score count mismatch, similarity order used",
                ));
                return positional_order(documents, top_k);
            }
            Err(e) => {
                warn!(error = %e, "reranking failed, using similarity order");
                degradations.push(Degradation::new(
                    Stage::Reranking,
                    format!("scoring failed: {}", e),
                ));
                return positional_order(documents, top_k);
            }
        };

        let mut scored: Vec<ScoredChunk> = documents
            .iter()
            .zip(scores)
            .map(|(doc, score)| ScoredChunk {
                text: doc.clone(),
                score,
            })
            .collect();

        // Stable sort keeps input order for tied scores
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // Uniformly low scores mean the model recognizes nothing;
        // vector similarity order is more trustworthy then
        let all_low = scored
            .iter()
            .take(LOW_CONFIDENCE_WINDOW)
            .all(|c| c.score < self.low_confidence_threshold);
        if all_low {
            debug!("low reranking confidence, using similarity order");
            degradations.push(Degradation::new(
                Stage::Reranking,
                "low-confidence scores, similarity order used",
            ));
            return positional_order(documents, top_k);
        }

        scored.truncate(top_k);
        scored
    }

    /// Cross-encoders score better against English queries; the
    /// non-ASCII check is a cheap stand-in for language detection.
    async fn query_for_scoring(
        &self,
        query: &str,
        degradations: &mut Vec<Degradation>,
    ) -> String {
        if query.is_ascii() {
            return query.to_string();
        }

        let prompt = format!("Translate to English (if not English): {}", query);
        match self.generator.generate(&prompt, TRANSLATE_PARAMS).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) | Err(_) => {
                degradations.push(Degradation::new(
                    Stage::Reranking,
                    "query translation for scoring failed, original used",
                ));
                query.to_string()
            }
        }
    }
}

/// First `top_k` documents in given order, positional pseudo-scores
fn positional_order(documents: &[String], top_k: usize) -> Vec<ScoredChunk> {
    documents
        .iter()
        .take(top_k)
        .enumerate()
        .map(|(idx, doc)| ScoredChunk {
            text: doc.clone(),
            score: idx as f32,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Result as RagResult;
    use async_trait::async_trait;

    struct EchoGenerator;

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        async fn generate(&self, _prompt: &str, _params: GenerationParams) -> RagResult<String> {
            Ok("translated query".to_string())
        }
    }

    struct FixedScorer {
        scores: Vec<f32>,
    }

    impl RelevanceScorer for FixedScorer {
        fn predict(&self, _pairs: &[(String, String)]) -> anyhow::Result<Vec<f32>> {
            Ok(self.scores.clone())
        }
    }

    struct FailingScorer;

    impl RelevanceScorer for FailingScorer {
        fn predict(&self, _pairs: &[(String, String)]) -> anyhow::Result<Vec<f32>> {
            anyhow::bail!("model crashed")
        }
    }

    fn docs(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("document number {}", i)).collect()
    }

    #[tokio::test]
    async fn test_no_scorer_preserves_input_order() {
        let stage = RerankStage::new(None, Arc::new(EchoGenerator), -10.0);
        let documents = docs(5);

        let mut degradations = Vec::new();
        let ranked = stage.rerank("query", &documents, 3, &mut degradations).await;

        assert_eq!(ranked.len(), 3);
        for (idx, chunk) in ranked.iter().enumerate() {
            assert_eq!(chunk.text, documents[idx]);
            assert_eq!(chunk.score, idx as f32);
        }
    }

    #[tokio::test]
    async fn test_rerank_sorts_by_score_descending() {
        let scorer = FixedScorer {
            scores: vec![1.0, 9.0, 5.0],
        };
        let stage = RerankStage::new(Some(Arc::new(scorer)), Arc::new(EchoGenerator), -10.0);
        let documents = docs(3);

        let mut degradations = Vec::new();
        let ranked = stage.rerank("query", &documents, 3, &mut degradations).await;

        assert_eq!(ranked[0].text, documents[1]);
        assert_eq!(ranked[1].text, documents[2]);
        assert_eq!(ranked[2].text, documents[0]);
        assert!(degradations.is_empty());
    }

    #[tokio::test]
    async fn test_low_confidence_falls_back_to_input_order() {
        let scorer = FixedScorer {
            scores: vec![-12.0, -11.5, -20.0, -15.0],
        };
        let stage = RerankStage::new(Some(Arc::new(scorer)), Arc::new(EchoGenerator), -10.0);
        let documents = docs(4);

        let mut degradations = Vec::new();
        let ranked = stage.rerank("query", &documents, 4, &mut degradations).await;

        for (idx, chunk) in ranked.iter().enumerate() {
            assert_eq!(chunk.text, documents[idx]);
        }
        assert_eq!(degradations.len(), 1);
        assert_eq!(degradations[0].stage, Stage::Reranking);
    }

    #[tokio::test]
    async fn test_scoring_failure_falls_back() {
        let stage = RerankStage::new(Some(Arc::new(FailingScorer)), Arc::new(EchoGenerator), -10.0);
        let documents = docs(3);

        let mut degradations = Vec::new();
        let ranked = stage.rerank("query", &documents, 2, &mut degradations).await;

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].text, documents[0]);
        assert_eq!(degradations.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_documents_return_empty() {
        let scorer = FixedScorer { scores: vec![] };
        let stage = RerankStage::new(Some(Arc::new(scorer)), Arc::new(EchoGenerator), -10.0);

        let mut degradations = Vec::new();
        let ranked = stage.rerank("query", &[], 6, &mut degradations).await;

        assert!(ranked.is_empty());
    }

    #[tokio::test]
    async fn test_ties_keep_input_order() {
        let scorer = FixedScorer {
            scores: vec![2.0, 2.0, 2.0],
        };
        let stage = RerankStage::new(Some(Arc::new(scorer)), Arc::new(EchoGenerator), -10.0);
        let documents = docs(3);

        let mut degradations = Vec::new();
        let ranked = stage.rerank("query", &documents, 3, &mut degradations).await;

        for (idx, chunk) in ranked.iter().enumerate() {
            assert_eq!(chunk.text, documents[idx]);
        }
    }
}

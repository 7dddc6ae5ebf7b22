//! Answer synthesis
//!
//! Joins the surviving documents into one context block, renders the
//! persona prompt and makes the single generation call. The raw output
//! is scrubbed of forbidden hedging phrases to enforce the persona
//! contract even when the model drifts.

use crate::clients::{GenerationParams, TextGenerator};
use crate::persona::Persona;
use crate::rag::{Degradation, Stage};
use std::sync::Arc;
use tracing::{debug, warn};

/// Separator between documents in the assembled context
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

const ANSWER_PARAMS: GenerationParams = GenerationParams {
    temperature: 0.3,
    max_output_tokens: 2048,
};

/// Produces the final grounded answer from the surviving documents
pub struct AnswerSynthesizer {
    generator: Arc<dyn TextGenerator>,
    persona: Persona,
}

impl AnswerSynthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>, persona: Persona) -> Self {
        Self { generator, persona }
    }

    /// Message returned when retrieval produced nothing
    pub fn no_context_message(&self) -> &str {
        &self.persona.no_context_message
    }

    /// Join document texts into the context block
    pub fn assemble_context(documents: &[String]) -> String {
        documents.join(CONTEXT_SEPARATOR)
    }

    /// Generate the answer for `query` against `context`.
    ///
    /// A failed or empty generation yields the persona's fixed failure
    /// message rather than an error; the cause is recorded.
    pub async fn synthesize(
        &self,
        query: &str,
        conversation_history: &str,
        context: &str,
        degradations: &mut Vec<Degradation>,
    ) -> String {
        let prompt = self.persona.render(conversation_history, context, query);

        debug!(prompt_chars = prompt.len(), "generating answer");

        match self.generator.generate(&prompt, ANSWER_PARAMS).await {
            Ok(raw) => self.persona.scrub(&raw),
            Err(e) => {
                warn!(error = %e, "answer generation failed");
                degradations.push(Degradation::new(
                    Stage::Synthesis,
                    format!("generation failed: {}", e),
                ));
                self.persona.failure_message.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{RagError, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingGenerator {
        response: Option<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextGenerator for CountingGenerator {
        async fn generate(&self, _prompt: &str, _params: GenerationParams) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.response {
                Some(text) => Ok(text.to_string()),
                None => Err(RagError::Generation("stubbed failure".to_string())),
            }
        }
    }

    #[test]
    fn test_assemble_context_joins_with_separator() {
        let documents = vec!["first doc".to_string(), "second doc".to_string()];
        let context = AnswerSynthesizer::assemble_context(&documents);
        assert_eq!(context, "first doc\n\n---\n\nsecond doc");
    }

    #[tokio::test]
    async fn test_synthesize_scrubs_hedging_phrases() {
        let generator = Arc::new(CountingGenerator {
            response: Some("Kesin cevap. Ama belki de durum farklı olabilir."),
            calls: AtomicUsize::new(0),
        });
        let synthesizer = AnswerSynthesizer::new(generator, Persona::default());

        let mut degradations = Vec::new();
        let answer = synthesizer
            .synthesize("soru", "", "context", &mut degradations)
            .await;

        assert!(!answer.contains("belki de"));
        assert!(!answer.contains("olabilir"));
        assert!(answer.contains("Kesin cevap."));
    }

    #[tokio::test]
    async fn test_synthesize_failure_returns_fixed_message() {
        let generator = Arc::new(CountingGenerator {
            response: None,
            calls: AtomicUsize::new(0),
        });
        let persona = Persona::default();
        let expected = persona.failure_message.clone();
        let synthesizer = AnswerSynthesizer::new(generator, persona);

        let mut degradations = Vec::new();
        let answer = synthesizer
            .synthesize("q", "", "context", &mut degradations)
            .await;

        assert_eq!(answer, expected);
        assert_eq!(degradations.len(), 1);
        assert_eq!(degradations[0].stage, Stage::Synthesis);
    }

    #[tokio::test]
    async fn test_synthesize_renders_history_and_context() {
        let generator = Arc::new(CountingGenerator {
            response: Some("fine"),
            calls: AtomicUsize::new(0),
        });
        let synthesizer = AnswerSynthesizer::new(generator.clone(), Persona::default());

        let mut degradations = Vec::new();
        let _ = synthesizer
            .synthesize("q", "earlier turns", "the context", &mut degradations)
            .await;

        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert!(degradations.is_empty());
    }
}

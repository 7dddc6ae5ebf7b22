//! Query expansion
//!
//! The vector index holds English-language content, so non-English
//! questions are translated first, then diversified into alternative
//! phrasings to widen recall across semantic gaps.

use crate::clients::{GenerationParams, TextGenerator};
use crate::rag::{Degradation, Stage};
use std::sync::Arc;
use tracing::{debug, warn};

const TRANSLATE_PARAMS: GenerationParams = GenerationParams {
    temperature: 0.3,
    max_output_tokens: 100,
};

const VARIATION_PARAMS: GenerationParams = GenerationParams {
    temperature: 0.7,
    max_output_tokens: 200,
};

/// Generates retrieval query variations for one user question
pub struct QueryExpander {
    generator: Arc<dyn TextGenerator>,
    max_queries: usize,
}

impl QueryExpander {
    pub fn new(generator: Arc<dyn TextGenerator>, max_queries: usize) -> Self {
        Self {
            generator,
            max_queries,
        }
    }

    /// Expand a question into 1..=max_queries retrieval queries.
    ///
    /// Element 0 is always the English-normalized form of the original
    /// question (the original verbatim when translation fails). Never
    /// fails; every upstream error falls back and is recorded.
    pub async fn expand(
        &self,
        original_query: &str,
        degradations: &mut Vec<Degradation>,
    ) -> Vec<String> {
        let english_query = match self.translate(original_query).await {
            Some(translated) => {
                debug!(query = %translated, "translated query for retrieval");
                translated
            }
            None => {
                warn!("query translation failed, using original verbatim");
                degradations.push(Degradation::new(
                    Stage::Expansion,
                    "translation failed, original query used",
                ));
                original_query.to_string()
            }
        };

        let prompt = format!(
            "Original query: \"{}\"\n\n\
             Generate 3 alternative versions of this query:\n\
             1. A more specific version\n\
             2. A more general version\n\
             3. A version using related concepts\n\n\
             Write only the questions, one per line. No numbering.",
            english_query
        );

        let mut queries = vec![english_query];

        match self.generator.generate(&prompt, VARIATION_PARAMS).await {
            Ok(response) => {
                queries.extend(parse_variations(&response));
            }
            Err(e) => {
                warn!(error = %e, "multi-query generation failed");
                degradations.push(Degradation::new(
                    Stage::Expansion,
                    format!("variation generation failed: {}", e),
                ));
            }
        }

        queries.truncate(self.max_queries);
        debug!(count = queries.len(), "expanded query set ready");
        queries
    }

    /// Translate to English, or None on any failure or empty result
    async fn translate(&self, query: &str) -> Option<String> {
        let prompt = format!(
            "Translate this question to English. If it's already in English, \
             just return it as is.\nQuestion: {}\nTranslation:",
            query
        );

        match self.generator.generate(&prompt, TRANSLATE_PARAMS).await {
            Ok(text) => {
                let trimmed = text.trim().to_string();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed)
                }
            }
            Err(_) => None,
        }
    }
}

/// Parse generated variations, one candidate per non-empty line.
///
/// Leading list markers (digits, '.', '-', spaces) are stripped; lines
/// of 3 or fewer characters after stripping are discarded.
fn parse_variations(response: &str) -> Vec<String> {
    response
        .lines()
        .filter_map(|line| {
            let cleaned = line
                .trim()
                .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == '-' || c == ' ')
                .trim();
            if cleaned.chars().count() > 3 {
                Some(cleaned.to_string())
            } else {
                None
            }
        })
        .collect()
}

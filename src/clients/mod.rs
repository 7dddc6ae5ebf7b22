//! Remote model client seams
//!
//! The pipeline talks to its generative and embedding services through
//! these traits so stages can be exercised against stubs. The production
//! adapter for both lives in [`gemini`].

pub mod gemini;

pub use gemini::GeminiClient;

use crate::errors::Result;
use async_trait::async_trait;

/// Sampling parameters for one generation call
#[derive(Debug, Clone, Copy)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl GenerationParams {
    pub fn new(temperature: f32, max_output_tokens: u32) -> Self {
        Self {
            temperature,
            max_output_tokens,
        }
    }
}

/// Task mode passed to the embedding service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingTask {
    RetrievalQuery,
    RetrievalDocument,
}

impl EmbeddingTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingTask::RetrievalQuery => "RETRIEVAL_QUERY",
            EmbeddingTask::RetrievalDocument => "RETRIEVAL_DOCUMENT",
        }
    }
}

/// Remote text-generation service
///
/// An empty response body is reported as an error; callers decide the
/// fallback.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, params: GenerationParams) -> Result<String>;
}

/// Remote embedding service
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str, task: EmbeddingTask) -> Result<Vec<f32>>;
}

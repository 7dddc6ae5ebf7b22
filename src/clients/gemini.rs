//! Gemini REST API client
//!
//! Low-level HTTP adapter for the generateContent and embedContent
//! endpoints, implementing both [`TextGenerator`] and [`Embedder`].

use crate::clients::{Embedder, EmbeddingTask, GenerationParams, TextGenerator};
use crate::errors::{RagError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default Gemini API endpoint
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// HTTP client for the Gemini API
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    generation_model: String,
    embedding_model: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest {
    content: Content,
    task_type: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Option<EmbeddingValues>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    #[serde(default)]
    values: Vec<f32>,
}

impl GeminiClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `api_key` - Gemini API key
    /// * `generation_model` - model tag for text generation
    /// * `embedding_model` - model tag for embeddings
    /// * `timeout` - per-request timeout
    pub fn new(
        api_key: String,
        generation_model: String,
        embedding_model: String,
        timeout: Duration,
    ) -> Result<Self> {
        Self::with_base_url(
            DEFAULT_BASE_URL.to_string(),
            api_key,
            generation_model,
            embedding_model,
            timeout,
        )
    }

    /// Create a client against a custom base URL
    pub fn with_base_url(
        base_url: String,
        api_key: String,
        generation_model: String,
        embedding_model: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RagError::Http)?;

        Ok(Self {
            client,
            base_url,
            api_key,
            generation_model,
            embedding_model,
        })
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str, params: GenerationParams) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.generation_model, self.api_key
        );

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: params.temperature,
                max_output_tokens: params.max_output_tokens,
            },
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::Generation(format!("HTTP {}: {}", status, body)));
        }

        let parsed: GenerateResponse = response.json().await?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        // Empty or missing text counts as failure
        if text.trim().is_empty() {
            return Err(RagError::Generation("empty response".to_string()));
        }

        Ok(text)
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    async fn embed(&self, text: &str, task: EmbeddingTask) -> Result<Vec<f32>> {
        let url = format!(
            "{}/models/{}:embedContent?key={}",
            self.base_url, self.embedding_model, self.api_key
        );

        let request = EmbedRequest {
            content: Content {
                parts: vec![Part {
                    text: text.to_string(),
                }],
            },
            task_type: task.as_str().to_string(),
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!("HTTP {}: {}", status, body)));
        }

        let parsed: EmbedResponse = response.json().await?;

        let values = parsed.embedding.map(|e| e.values).unwrap_or_default();
        if values.is_empty() {
            return Err(RagError::Embedding("empty embedding".to_string()));
        }

        Ok(values)
    }
}

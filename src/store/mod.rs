//! Vector store seam
//!
//! The pipeline only reads from the store; ingestion is owned by an
//! external process. The production adapter is [`qdrant::QdrantStore`].

pub mod qdrant;

pub use qdrant::QdrantStore;

use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// One chunk returned by a nearest-neighbor lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub metadata: HashMap<String, JsonValue>,
    /// Vector-space distance to the query embedding, lower is closer
    pub distance: f32,
}

/// Read-only nearest-neighbor index over document chunks
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Return the `n_results` nearest chunks to `embedding`,
    /// closest first
    async fn query(&self, embedding: &[f32], n_results: usize) -> Result<Vec<RetrievedChunk>>;

    /// Number of chunks in the collection
    async fn count(&self) -> Result<u64>;
}

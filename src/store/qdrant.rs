//! Qdrant vector store adapter
//!
//! Queries a single named collection populated by the external ingestion
//! process. Chunk text is stored under the `document` payload key; the
//! remaining payload entries come back as chunk metadata.

use crate::errors::{RagError, Result};
use crate::store::{RetrievedChunk, VectorStore};
use anyhow::Context;
use async_trait::async_trait;
use qdrant_client::{
    client::QdrantClient,
    qdrant::{
        with_payload_selector::SelectorOptions, SearchPoints, Value as QdrantValue,
        WithPayloadSelector,
    },
};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// Qdrant-backed read-only vector store
pub struct QdrantStore {
    client: QdrantClient,
    collection: String,
}

impl QdrantStore {
    /// Connect to a qdrant instance and bind to one collection
    pub fn new(url: &str, collection: &str) -> Result<Self> {
        let client = QdrantClient::from_url(url)
            .build()
            .context("Failed to create qdrant client")
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        Ok(Self {
            client,
            collection: collection.to_string(),
        })
    }

    /// Collection this store reads from
    pub fn collection(&self) -> &str {
        &self.collection
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn query(&self, embedding: &[f32], n_results: usize) -> Result<Vec<RetrievedChunk>> {
        let search_result = self
            .client
            .search_points(&SearchPoints {
                collection_name: self.collection.clone(),
                vector: embedding.to_vec(),
                limit: n_results as u64,
                with_payload: Some(WithPayloadSelector {
                    selector_options: Some(SelectorOptions::Enable(true)),
                }),
                ..Default::default()
            })
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        let chunks = search_result
            .result
            .into_iter()
            .map(|point| {
                let payload = point.payload;
                let text = payload
                    .get("document")
                    .and_then(qdrant_value_to_string)
                    .unwrap_or_default();

                let mut metadata = HashMap::new();
                for (key, value) in payload {
                    if key != "document" {
                        if let Some(json_val) = qdrant_to_json_value(&value) {
                            metadata.insert(key, json_val);
                        }
                    }
                }

                RetrievedChunk {
                    text,
                    metadata,
                    // Cosine similarity score from qdrant, inverted so
                    // lower means closer
                    distance: 1.0 - point.score,
                }
            })
            .collect();

        Ok(chunks)
    }

    async fn count(&self) -> Result<u64> {
        let info = self
            .client
            .collection_info(&self.collection)
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        Ok(info.result.and_then(|r| r.points_count).unwrap_or(0))
    }
}

fn qdrant_to_json_value(value: &QdrantValue) -> Option<JsonValue> {
    value.kind.as_ref().and_then(|kind| {
        use qdrant_client::qdrant::value::Kind;
        match kind {
            Kind::StringValue(s) => Some(JsonValue::String(s.clone())),
            Kind::IntegerValue(i) => Some(JsonValue::Number((*i).into())),
            Kind::DoubleValue(f) => serde_json::Number::from_f64(*f).map(JsonValue::Number),
            Kind::BoolValue(b) => Some(JsonValue::Bool(*b)),
            _ => None,
        }
    })
}

fn qdrant_value_to_string(value: &QdrantValue) -> Option<String> {
    value.kind.as_ref().and_then(|kind| {
        use qdrant_client::qdrant::value::Kind;
        match kind {
            Kind::StringValue(s) => Some(s.clone()),
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_creation() {
        let store = QdrantStore::new("http://localhost:6334", "documents").unwrap();
        assert_eq!(store.collection(), "documents");
    }

    #[test]
    fn test_qdrant_value_conversions() {
        let val = QdrantValue::from("hello");
        assert_eq!(qdrant_value_to_string(&val), Some("hello".to_string()));
        assert_eq!(
            qdrant_to_json_value(&val),
            Some(JsonValue::String("hello".to_string()))
        );

        let val = QdrantValue::from(42i64);
        assert_eq!(qdrant_value_to_string(&val), None);
        assert_eq!(qdrant_to_json_value(&val), Some(JsonValue::from(42)));
    }

    #[tokio::test]
    #[ignore] // Integration test - requires Qdrant
    async fn test_query_empty_collection() {
        let store = QdrantStore::new("http://localhost:6334", "test_empty").unwrap();
        let count = store.count().await.unwrap();
        assert_eq!(count, 0);
    }
}

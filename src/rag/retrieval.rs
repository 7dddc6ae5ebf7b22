//! Multi-query retrieval
//!
//! Each expanded query is embedded and sent to the vector store
//! separately, then results are merged with content-based dedup. This
//! approximates a union of relevant neighborhoods without blurring
//! distinct query intents into a single combined embedding.

use crate::clients::{Embedder, EmbeddingTask};
use crate::rag::{Degradation, Stage};
use crate::store::{RetrievedChunk, VectorStore};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Fans expanded queries out to the vector store and aggregates results
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    /// Fingerprint only the first N characters of each chunk when set.
    /// The full-text fingerprint is the default; the prefix mode exists
    /// for parity with indexes deduplicated on 200-character prefixes.
    fingerprint_prefix: Option<usize>,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        fingerprint_prefix: Option<usize>,
    ) -> Self {
        Self {
            embedder,
            store,
            fingerprint_prefix,
        }
    }

    /// Retrieve up to `per_query_limit` chunks per query, deduplicated
    /// across queries. The first occurrence in sub-query order wins.
    ///
    /// Embedding or store failures skip the affected query; the method
    /// never fails and may return an empty list.
    pub async fn retrieve(
        &self,
        queries: &[String],
        per_query_limit: usize,
        degradations: &mut Vec<Degradation>,
    ) -> Vec<RetrievedChunk> {
        let mut aggregated = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        debug!(queries = queries.len(), "retrieving documents");

        for (idx, query) in queries.iter().enumerate() {
            let embedding = match self
                .embedder
                .embed(query, EmbeddingTask::RetrievalQuery)
                .await
            {
                Ok(e) if !e.is_empty() => e,
                Ok(_) => {
                    warn!(query_index = idx, "empty embedding, skipping query");
                    degradations.push(Degradation::new(
                        Stage::Retrieval,
                        format!("query {} returned empty embedding", idx + 1),
                    ));
                    continue;
                }
                Err(e) => {
                    warn!(query_index = idx, error = %e, "embedding failed, skipping query");
                    degradations.push(Degradation::new(
                        Stage::Retrieval,
                        format!("embedding failed for query {}: {}", idx + 1, e),
                    ));
                    continue;
                }
            };

            let results = match self.store.query(&embedding, per_query_limit).await {
                Ok(results) => results,
                Err(e) => {
                    warn!(query_index = idx, error = %e, "store lookup failed, skipping query");
                    degradations.push(Degradation::new(
                        Stage::Retrieval,
                        format!("store lookup failed for query {}: {}", idx + 1, e),
                    ));
                    continue;
                }
            };

            for chunk in results {
                let fingerprint = self.fingerprint(&chunk.text);
                if seen.insert(fingerprint) {
                    aggregated.push(chunk);
                }
            }
        }

        debug!(unique = aggregated.len(), "retrieval aggregation complete");
        aggregated
    }

    fn fingerprint(&self, text: &str) -> String {
        let mut hasher = Sha256::new();
        match self.fingerprint_prefix {
            Some(n) => {
                let prefix: String = text.chars().take(n).collect();
                hasher.update(prefix.as_bytes());
            }
            None => hasher.update(text.as_bytes()),
        }
        hex::encode(hasher.finalize())
    }
}

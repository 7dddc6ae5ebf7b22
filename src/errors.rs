//! Error types for the ragpipe engine
//!
//! Stage-internal failures inside the rag pipeline are swallowed and
//! recorded as degradations; these variants surface only from adapter
//! construction and the store maintenance paths.

use thiserror::Error;

/// Main error type for the retrieval/generation engine
#[derive(Error, Debug)]
pub enum RagError {
    /// Generative service errors (HTTP-level or empty responses)
    #[error("Generation error: {0}")]
    Generation(String),

    /// Embedding service errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector store errors
    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RagError::Generation("empty response".to_string());
        assert!(err.to_string().contains("empty response"));
    }

    #[test]
    fn test_config_error_display() {
        let err = RagError::Config("missing API key".to_string());
        assert!(err.to_string().contains("missing API key"));
    }
}

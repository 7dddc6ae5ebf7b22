//! ragpipe - Retrieval-augmented answer engine
//!
//! Turns a natural-language question (possibly non-English) and an
//! optional conversation history into a grounded answer plus the
//! document context it was built from.
//!
//! # Architecture
//!
//! - **clients**: generative and embedding service adapters (Gemini REST)
//! - **store**: read-only qdrant nearest-neighbor index
//! - **rag**: query expansion, multi-query retrieval, cross-encoder
//!   reranking, answer synthesis
//!
//! The calling application layer (sessions, billing, HTTP) lives
//! elsewhere; its only entry point here is [`rag::RagPipeline::answer`].

pub mod clients;
pub mod config;
pub mod errors;
pub mod persona;
pub mod rag;
pub mod store;

// Re-export commonly used types
pub use errors::{RagError, Result};
pub use persona::Persona;
pub use rag::{RagAnswer, RagPipeline};

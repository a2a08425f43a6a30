//! AskForge Common Library
//!
//! Shared code for the AskForge crates including:
//! - Chunk model and content-addressed chunk ids
//! - Embedding and language model client abstractions
//! - Error types and handling
//! - Configuration management
//! - Database connection pool for the persisted semantic index
//! - Metrics and observability

pub mod chunk;
pub mod config;
pub mod db;
pub mod embeddings;
pub mod errors;
pub mod llm;
pub mod metrics;

// Re-export commonly used types
pub use chunk::{join_context, parse_chunks, read_chunks, Chunk, ChunkId, ChunkMetadata};
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use llm::{CompletionRequest, LanguageModel};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

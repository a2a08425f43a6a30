//! AskForge Search
//!
//! Retrieval backends for the agent:
//! - BM25 keyword ranking over an in-memory chunk snapshot
//! - Semantic search over embeddings (in memory or pgvector)
//! - Hybrid retrieval with text deduplication

pub mod retrieval;

pub use retrieval::{
    HybridRetriever, InMemoryIndex, LexicalRanker, PgVectorIndex, RetrievalSource, Retriever,
    SemanticIndex,
};

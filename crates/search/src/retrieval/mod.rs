//! Retrieval over a fixed chunk collection
//!
//! Provides:
//! - Lexical ranking (in-memory BM25)
//! - Semantic search (embedding similarity, in memory or pgvector)
//! - Hybrid retrieval (semantic first, then lexical, deduplicated by text)

mod hybrid;
mod lexical;
mod memory;
mod pgvector;

pub use hybrid::HybridRetriever;
pub use lexical::{tokenize, Bm25Params, LexicalRanker};
pub use memory::InMemoryIndex;
pub use pgvector::PgVectorIndex;

use askforge_common::errors::Result;
use askforge_common::Chunk;
use serde::{Deserialize, Serialize};

/// Which backend produced a set of results
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalSource {
    /// Embedding similarity search
    Semantic,
    /// BM25 keyword ranking
    Lexical,
    /// Fused semantic + lexical results
    Hybrid,
}

impl RetrievalSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalSource::Semantic => "semantic",
            RetrievalSource::Lexical => "lexical",
            RetrievalSource::Hybrid => "hybrid",
        }
    }
}

/// Persisted collection of embedded chunks
#[async_trait::async_trait]
pub trait SemanticIndex: Send + Sync {
    /// Top `k` chunks by embedding similarity, most similar first
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Chunk>>;

    /// Embed and store chunks under their content-addressed ids.
    ///
    /// Chunks whose id is already stored are skipped. Returns the number
    /// of newly stored chunks.
    async fn insert(&self, chunks: &[Chunk]) -> Result<usize>;

    /// Every stored chunk, in insertion order
    async fn chunks(&self) -> Result<Vec<Chunk>>;

    /// Stable identifier of the collection
    fn collection(&self) -> &str;
}

/// Source of ranked context for a question
#[async_trait::async_trait]
pub trait Retriever: Send + Sync {
    /// At most `k` chunks relevant to `query`, best first
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Chunk>>;
}

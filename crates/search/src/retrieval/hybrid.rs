//! Hybrid retrieval combining semantic and lexical search
//!
//! Semantic results come first, lexical results follow, and the
//! concatenation is deduplicated by exact text before the cap is applied.
//! Scores from the two backends are never compared.

use super::{LexicalRanker, RetrievalSource, Retriever, SemanticIndex};
use askforge_common::errors::{AppError, Result};
use askforge_common::metrics;
use askforge_common::Chunk;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Hybrid retriever over one semantic index and one lexical snapshot
pub struct HybridRetriever {
    semantic: Arc<dyn SemanticIndex>,
    lexical: LexicalRanker,
}

impl HybridRetriever {
    /// Create a new hybrid retriever
    pub fn new(semantic: Arc<dyn SemanticIndex>, lexical: LexicalRanker) -> Self {
        Self { semantic, lexical }
    }

    /// Build the lexical snapshot from everything the index holds
    pub async fn from_index(semantic: Arc<dyn SemanticIndex>) -> Result<Self> {
        let chunks = semantic.chunks().await?;
        info!(
            collection = semantic.collection(),
            chunk_count = chunks.len(),
            "Building hybrid retriever"
        );
        Ok(Self::new(semantic, LexicalRanker::new(chunks)))
    }

    /// Number of chunks in the lexical snapshot
    pub fn corpus_size(&self) -> usize {
        self.lexical.len()
    }

    /// Collection the semantic side searches
    pub fn collection(&self) -> &str {
        self.semantic.collection()
    }

    async fn fetch(&self, query: &str, k: usize) -> Result<(Vec<Chunk>, Vec<Chunk>)> {
        let start = Instant::now();
        let semantic = self.semantic.search(query, k).await?;
        metrics::record_retrieval(
            start.elapsed().as_secs_f64(),
            RetrievalSource::Semantic.as_str(),
            semantic.len(),
        );

        let start = Instant::now();
        let lexical = self.lexical.rank(query, k);
        metrics::record_retrieval(
            start.elapsed().as_secs_f64(),
            RetrievalSource::Lexical.as_str(),
            lexical.len(),
        );

        Ok((semantic, lexical))
    }
}

/// Concatenate, drop repeated texts keeping the first occurrence, cap at `k`
pub fn fuse(semantic: Vec<Chunk>, lexical: Vec<Chunk>, k: usize) -> Vec<Chunk> {
    let mut seen: HashSet<String> = HashSet::new();
    semantic
        .into_iter()
        .chain(lexical)
        .filter(|chunk| seen.insert(chunk.content.clone()))
        .take(k)
        .collect()
}

#[async_trait::async_trait]
impl Retriever for HybridRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Chunk>> {
        if k == 0 {
            return Err(AppError::Validation {
                message: "k must be greater than zero".to_string(),
                field: Some("k".to_string()),
            });
        }

        info!(query, k, "Retrieving docs");
        let start = Instant::now();

        let (semantic, lexical) = self.fetch(query, k).await.map_err(|e| match e {
            AppError::Retrieval { .. } => e,
            other => AppError::retrieval(format!("retrieve failed: {}", other)),
        })?;

        debug!(
            semantic = semantic.len(),
            lexical = lexical.len(),
            "Backend results"
        );

        let fused = fuse(semantic, lexical, k);
        metrics::record_retrieval(
            start.elapsed().as_secs_f64(),
            RetrievalSource::Hybrid.as_str(),
            fused.len(),
        );
        info!(unique = fused.len(), "Hybrid retrieval finished");

        Ok(fused)
    }
}

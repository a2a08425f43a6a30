//! In-memory semantic index
//!
//! Brute-force cosine similarity over embedded chunks. Used for tests and
//! for running without a database.

use super::SemanticIndex;
use askforge_common::embeddings::{cosine_similarity, Embedder};
use askforge_common::errors::Result;
use askforge_common::{Chunk, ChunkId};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

struct StoredChunk {
    chunk: Chunk,
    embedding: Vec<f32>,
}

#[derive(Default)]
struct Entries {
    ids: HashSet<ChunkId>,
    rows: Vec<StoredChunk>,
}

/// Semantic index held entirely in process memory
pub struct InMemoryIndex {
    collection: String,
    embedder: Arc<dyn Embedder>,
    entries: RwLock<Entries>,
}

impl InMemoryIndex {
    /// Create an empty index
    pub fn new(collection: impl Into<String>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            collection: collection.into(),
            embedder,
            entries: RwLock::new(Entries::default()),
        }
    }

    /// Number of stored chunks
    pub async fn len(&self) -> usize {
        self.entries.read().await.rows.len()
    }
}

#[async_trait::async_trait]
impl SemanticIndex for InMemoryIndex {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Chunk>> {
        let query_embedding = self.embedder.embed(query).await?;
        let entries = self.entries.read().await;

        let mut scored: Vec<(f32, usize)> = entries
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| (cosine_similarity(&query_embedding, &row.embedding), i))
            .collect();

        // Stable sort: equal similarity keeps insertion order.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, i)| entries.rows[i].chunk.clone())
            .collect())
    }

    async fn insert(&self, chunks: &[Chunk]) -> Result<usize> {
        let mut fresh = Vec::new();
        let mut pending = HashSet::new();
        {
            let entries = self.entries.read().await;
            for chunk in chunks {
                let id = chunk.id();
                if !entries.ids.contains(&id) && pending.insert(id.clone()) {
                    fresh.push((id, chunk.clone()));
                }
            }
        }

        if fresh.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = fresh.iter().map(|(_, c)| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let mut entries = self.entries.write().await;
        let mut inserted = 0;
        for ((id, chunk), embedding) in fresh.into_iter().zip(embeddings) {
            if entries.ids.insert(id) {
                entries.rows.push(StoredChunk { chunk, embedding });
                inserted += 1;
            }
        }

        info!(
            collection = %self.collection,
            inserted,
            total = entries.rows.len(),
            "Chunks added to in-memory index"
        );
        Ok(inserted)
    }

    async fn chunks(&self) -> Result<Vec<Chunk>> {
        let entries = self.entries.read().await;
        Ok(entries.rows.iter().map(|row| row.chunk.clone()).collect())
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}

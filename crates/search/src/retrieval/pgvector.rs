//! Persisted semantic index using Postgres + pgvector
//!
//! Chunks live in one table keyed by `(collection, id)` so several
//! collections can share a database and survive restarts.

use super::SemanticIndex;
use askforge_common::db::DbPool;
use askforge_common::embeddings::Embedder;
use askforge_common::errors::{AppError, Result};
use askforge_common::{Chunk, ChunkMetadata};
use sea_orm::{ConnectionTrait, DbBackend, QueryResult, Statement};
use std::sync::Arc;
use tracing::{info, warn};

/// pgvector refuses HNSW indexes above this many dimensions
const MAX_INDEXED_DIMENSION: usize = 2000;

/// Semantic index backed by a pgvector table
pub struct PgVectorIndex {
    db: Arc<DbPool>,
    embedder: Arc<dyn Embedder>,
    collection: String,
}

impl PgVectorIndex {
    /// Create a new index handle over an existing pool
    pub fn new(db: Arc<DbPool>, embedder: Arc<dyn Embedder>, collection: impl Into<String>) -> Self {
        Self {
            db,
            embedder,
            collection: collection.into(),
        }
    }

    /// Create the extension, table and ANN index if missing
    pub async fn ensure_schema(&self) -> Result<()> {
        let conn = self.db.write();
        let dimension = self.embedder.dimension();

        conn.execute_unprepared("CREATE EXTENSION IF NOT EXISTS vector")
            .await?;

        conn.execute_unprepared(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS askforge_chunks (
                seq BIGSERIAL,
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                content TEXT NOT NULL,
                metadata JSONB NOT NULL,
                embedding vector({dimension}) NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (collection, id)
            )
            "#
        ))
        .await?;

        if dimension <= MAX_INDEXED_DIMENSION {
            conn.execute_unprepared(
                "CREATE INDEX IF NOT EXISTS askforge_chunks_embedding_idx \
                 ON askforge_chunks USING hnsw (embedding vector_cosine_ops)",
            )
            .await?;
        } else {
            warn!(
                dimension,
                "Embedding dimension too large for an HNSW index, searches will scan"
            );
        }

        info!(collection = %self.collection, dimension, "Semantic index schema ready");
        Ok(())
    }

    fn row_to_chunk(row: &QueryResult) -> Result<Chunk> {
        let content: String = row.try_get("", "content")?;
        let metadata: String = row.try_get("", "metadata")?;
        let metadata: ChunkMetadata = serde_json::from_str(&metadata)?;
        Ok(Chunk { content, metadata })
    }
}

/// Format an embedding as a pgvector literal, e.g. `[0.1,0.2,0.3]`
pub(crate) fn vector_literal(embedding: &[f32]) -> String {
    format!(
        "[{}]",
        embedding
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(",")
    )
}

#[async_trait::async_trait]
impl SemanticIndex for PgVectorIndex {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Chunk>> {
        let embedding = self.embedder.embed(query).await?;

        let sql = r#"
            SELECT content, metadata::text AS metadata
            FROM askforge_chunks
            WHERE collection = $1
            ORDER BY embedding <=> $2::vector, seq
            LIMIT $3
        "#;

        let rows = self
            .db
            .read()
            .query_all(Statement::from_sql_and_values(
                DbBackend::Postgres,
                sql,
                vec![
                    self.collection.clone().into(),
                    vector_literal(&embedding).into(),
                    (k as i64).into(),
                ],
            ))
            .await
            .map_err(|e| AppError::Retrieval {
                message: format!("Vector search failed: {}", e),
            })?;

        rows.iter().map(Self::row_to_chunk).collect()
    }

    async fn insert(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let sql = r#"
            INSERT INTO askforge_chunks (collection, id, content, metadata, embedding)
            VALUES ($1, $2, $3, $4::jsonb, $5::vector)
            ON CONFLICT (collection, id) DO NOTHING
        "#;

        let conn = self.db.write();
        let mut inserted = 0usize;
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            let metadata = serde_json::to_string(&chunk.metadata)?;
            let result = conn
                .execute(Statement::from_sql_and_values(
                    DbBackend::Postgres,
                    sql,
                    vec![
                        self.collection.clone().into(),
                        chunk.id().to_string().into(),
                        chunk.content.clone().into(),
                        metadata.into(),
                        vector_literal(&embedding).into(),
                    ],
                ))
                .await?;
            inserted += result.rows_affected() as usize;
        }

        info!(
            collection = %self.collection,
            submitted = chunks.len(),
            inserted,
            "Chunks added to pgvector index"
        );
        Ok(inserted)
    }

    async fn chunks(&self) -> Result<Vec<Chunk>> {
        let sql = r#"
            SELECT content, metadata::text AS metadata
            FROM askforge_chunks
            WHERE collection = $1
            ORDER BY seq
        "#;

        let rows = self
            .db
            .read()
            .query_all(Statement::from_sql_and_values(
                DbBackend::Postgres,
                sql,
                vec![self.collection.clone().into()],
            ))
            .await?;

        rows.iter().map(Self::row_to_chunk).collect()
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_literal() {
        assert_eq!(vector_literal(&[0.1, 0.2, 0.3]), "[0.1,0.2,0.3]");
        assert_eq!(vector_literal(&[]), "[]");
    }
}

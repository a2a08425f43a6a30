//! Startup loading of the chunk collection

use askforge_common::config::RetrievalConfig;
use askforge_common::errors::Result;
use askforge_common::read_chunks;
use askforge_search::{HybridRetriever, SemanticIndex};
use std::sync::Arc;
use tracing::info;

/// Insert the configured chunk snapshot, then build the hybrid retriever
///
/// The lexical snapshot is taken after insertion so both sides see the
/// same corpus. Chunks already in the index are skipped by id.
pub async fn build_retriever(
    index: Arc<dyn SemanticIndex>,
    config: &RetrievalConfig,
) -> Result<HybridRetriever> {
    if let Some(path) = config.chunks_path.as_deref() {
        let chunks = read_chunks(path)?;
        let inserted = index.insert(&chunks).await?;
        info!(
            path,
            read = chunks.len(),
            inserted,
            collection = index.collection(),
            "Loaded chunk snapshot"
        );
    }

    HybridRetriever::from_index(index).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use askforge_common::embeddings::MockEmbedder;
    use askforge_common::errors::AppError;
    use askforge_search::{InMemoryIndex, Retriever};
    use std::path::PathBuf;

    const SNAPSHOT: &str = concat!(
        r#"{"content": "Set the solver tolerance in solver.ini", "metadata": {"source": "manual.pdf", "page": 4}}"#,
        "\n",
        r#"{"content": "The license server listens on port 27000", "metadata": {"source": "admin.pdf", "page": 9}}"#,
        "\n",
    );

    fn write_snapshot(name: &str, text: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "askforge-{}-{}.jsonl",
            name,
            std::process::id()
        ));
        std::fs::write(&path, text).unwrap();
        path
    }

    fn index() -> Arc<InMemoryIndex> {
        Arc::new(InMemoryIndex::new("docs", Arc::new(MockEmbedder::new(64))))
    }

    fn config(path: Option<&PathBuf>) -> RetrievalConfig {
        RetrievalConfig {
            chunks_path: path.map(|p| p.display().to_string()),
            ..RetrievalConfig::default()
        }
    }

    #[tokio::test]
    async fn test_snapshot_feeds_both_sides() {
        let path = write_snapshot("both", SNAPSHOT);
        let index = index();

        let retriever = build_retriever(index.clone(), &config(Some(&path)))
            .await
            .unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(index.len().await, 2);
        assert_eq!(retriever.corpus_size(), 2);

        let semantic = index
            .search("The license server listens on port 27000", 1)
            .await
            .unwrap();
        assert_eq!(semantic[0].metadata.source, "admin.pdf");

        let hits = retriever.retrieve("license server port", 2).await.unwrap();
        assert!(hits.iter().any(|c| c.metadata.source == "admin.pdf"));
    }

    #[tokio::test]
    async fn test_reloading_skips_known_chunks() {
        let path = write_snapshot("reload", SNAPSHOT);
        let index = index();

        build_retriever(index.clone(), &config(Some(&path)))
            .await
            .unwrap();
        let retriever = build_retriever(index.clone(), &config(Some(&path)))
            .await
            .unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(index.len().await, 2);
        assert_eq!(retriever.corpus_size(), 2);
    }

    #[tokio::test]
    async fn test_without_path_uses_existing_index() {
        let retriever = build_retriever(index(), &config(None)).await.unwrap();
        assert_eq!(retriever.corpus_size(), 0);
    }

    #[tokio::test]
    async fn test_unreadable_snapshot_fails_startup() {
        let path = std::env::temp_dir().join("askforge-missing-snapshot.jsonl");
        let err = build_retriever(index(), &config(Some(&path)))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::Configuration { .. }));
    }
}

//! Retrievable text chunks and their content-addressed identifiers

use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// A unit of retrievable text produced by ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text
    pub content: String,

    /// Provenance of the text
    pub metadata: ChunkMetadata,
}

/// Provenance attached to every chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// File name the chunk came from
    pub source: String,

    /// 1-based page number for paged documents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    /// Position of the chunk within its source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u32>,

    /// Source kind (pdf, audio, ...)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Any other ingestion fields, e.g. `start_sec` for transcripts
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Chunk {
    /// Create a chunk attributed to `source`
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: ChunkMetadata {
                source: source.into(),
                ..Default::default()
            },
        }
    }

    /// Set the page number
    pub fn with_page(mut self, page: u32) -> Self {
        self.metadata.page = Some(page);
        self
    }

    /// Set the chunk index
    pub fn with_chunk_index(mut self, index: u32) -> Self {
        self.metadata.chunk_index = Some(index);
        self
    }

    /// Set the source kind
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.metadata.kind = Some(kind.into());
        self
    }

    /// Content-addressed identifier of this chunk
    pub fn id(&self) -> ChunkId {
        ChunkId::derive(self)
    }
}

/// Deterministic chunk identifier (hex SHA-256)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(String);

impl ChunkId {
    /// Derive the id from content and provenance.
    ///
    /// Re-ingesting the same text from the same place yields the same id,
    /// so duplicate inserts can be skipped by the index.
    pub fn derive(chunk: &Chunk) -> Self {
        let meta = &chunk.metadata;
        let page = meta
            .page
            .map(|p| p.to_string())
            .unwrap_or_else(|| "no_page".to_string());
        let key = format!(
            "{}_{}_{}_{}_{}",
            chunk.content,
            meta.source,
            page,
            meta.chunk_index.unwrap_or(0),
            meta.kind.as_deref().unwrap_or("unknown"),
        );

        let digest = Sha256::digest(key.as_bytes());
        Self(hex::encode(digest))
    }

    /// Wrap an id read back from storage
    pub fn from_stored(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Join chunk contents into a single prompt context, one chunk per line
pub fn join_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse a chunk snapshot: either one JSON array or JSON Lines
pub fn parse_chunks(text: &str) -> Result<Vec<Chunk>> {
    let trimmed = text.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).map_err(|e| AppError::Configuration {
            message: format!("invalid chunk array: {}", e),
        });
    }

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).map_err(|e| AppError::Configuration {
                message: format!("invalid chunk on line {}: {}", n + 1, e),
            })
        })
        .collect()
}

/// Read a chunk snapshot from disk
pub fn read_chunks(path: impl AsRef<Path>) -> Result<Vec<Chunk>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| AppError::Configuration {
        message: format!("cannot read chunks from {}: {}", path.display(), e),
    })?;
    parse_chunks(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_is_deterministic() {
        let a = Chunk::new("Solvers converge faster.", "manual.pdf").with_page(3);
        let b = Chunk::new("Solvers converge faster.", "manual.pdf").with_page(3);
        assert_eq!(a.id(), b.id());
        assert_eq!(a.id().as_str().len(), 64);
    }

    #[test]
    fn test_id_depends_on_provenance() {
        let base = Chunk::new("same text", "a.pdf").with_page(1);
        assert_ne!(base.id(), Chunk::new("same text", "a.pdf").with_page(2).id());
        assert_ne!(base.id(), Chunk::new("same text", "b.pdf").with_page(1).id());
        assert_ne!(
            base.id(),
            Chunk::new("same text", "a.pdf").with_page(1).with_kind("pdf").id()
        );
    }

    #[test]
    fn test_missing_fields_use_placeholders() {
        // An explicit chunk_index of 0 hashes like a missing one.
        let implicit = Chunk::new("text", "talk.mp3");
        let explicit = Chunk::new("text", "talk.mp3").with_chunk_index(0);
        assert_eq!(implicit.id(), explicit.id());
    }

    #[test]
    fn test_metadata_round_trips_extra_fields() {
        let json = serde_json::json!({
            "source": "talk.mp3",
            "chunk_index": 2,
            "start_sec": 1200,
            "end_sec": 1800
        });
        let meta: ChunkMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(meta.source, "talk.mp3");
        assert_eq!(meta.chunk_index, Some(2));
        assert_eq!(meta.page, None);
        assert_eq!(meta.extra.get("start_sec"), Some(&serde_json::json!(1200)));

        let back = serde_json::to_value(&meta).unwrap();
        assert_eq!(back["end_sec"], 1800);
        assert!(back.get("page").is_none());
    }

    #[test]
    fn test_join_context() {
        let chunks = vec![Chunk::new("first", "a"), Chunk::new("second", "b")];
        assert_eq!(join_context(&chunks), "first\nsecond");
        assert_eq!(join_context(&[]), "");
    }

    #[test]
    fn test_parse_chunks_array_and_lines() {
        let array = r#"[
            {"content": "first", "metadata": {"source": "a.pdf", "page": 1}},
            {"content": "second", "metadata": {"source": "b.pdf"}}
        ]"#;
        let chunks = parse_chunks(array).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].metadata.page, Some(1));

        let lines = "{\"content\": \"first\", \"metadata\": {\"source\": \"a.pdf\", \"page\": 1}}\n\n\
                     {\"content\": \"second\", \"metadata\": {\"source\": \"b.pdf\"}}\n";
        assert_eq!(parse_chunks(lines).unwrap(), chunks);
        assert!(parse_chunks("  \n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_chunks_reports_bad_line() {
        let text = "{\"content\": \"ok\", \"metadata\": {\"source\": \"a\"}}\nnot json\n";
        let err = parse_chunks(text).unwrap_err();
        assert!(matches!(err, AppError::Configuration { .. }));
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_read_missing_file_is_configuration_error() {
        let err = read_chunks("/nonexistent/askforge/chunks.jsonl").unwrap_err();
        assert!(matches!(err, AppError::Configuration { .. }));
    }
}

//! Document ingestion pipeline.
//!
//! Extraction, chunking, embedding, and indexing for one PDF at a time,
//! plus the bucket-notification entry point that drives ingestion from
//! storage events. Per-chunk embedding or indexing failures are counted
//! and logged but never abort the document; extraction failure is fatal
//! for the document since nothing downstream can run without text.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::chunk::chunk_text;
use crate::config::ChunkingConfig;
use crate::embedding::Embedder;
use crate::extract::extract_pages;
use crate::index::VectorIndex;
use crate::models::{Chunk, IndexedChunk, IngestReport};
use crate::storage::ObjectStore;

/// Bucket notification payload, the subset ingestion cares about.
#[derive(Debug, Deserialize)]
pub struct StorageEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,
}

#[derive(Debug, Deserialize)]
pub struct EventRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Deserialize)]
pub struct S3Entity {
    pub bucket: BucketRef,
    pub object: ObjectRef,
}

#[derive(Debug, Deserialize)]
pub struct BucketRef {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ObjectRef {
    pub key: String,
}

/// Turns one document's bytes into indexed chunks.
pub struct IngestPipeline<'a> {
    index: &'a dyn VectorIndex,
    embedder: &'a dyn Embedder,
    chunking: ChunkingConfig,
}

impl<'a> IngestPipeline<'a> {
    pub fn new(
        index: &'a dyn VectorIndex,
        embedder: &'a dyn Embedder,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            index,
            embedder,
            chunking,
        }
    }

    /// Ingest one PDF under the given filename. Re-ingesting a filename
    /// replaces its previous chunks: a best-effort delete runs first so
    /// stale chunks do not linger next to the new ones.
    pub async fn ingest_document(&self, filename: &str, bytes: &[u8]) -> Result<IngestReport> {
        self.index.ensure_index().await?;

        match self.index.delete_document(filename).await {
            Ok(0) => {}
            Ok(deleted) => {
                tracing::info!(filename, deleted, "removed stale chunks before re-ingest");
            }
            Err(e) => {
                tracing::warn!(filename, error = %e, "stale chunk cleanup failed, continuing");
            }
        }

        let pages = extract_pages(bytes)
            .with_context(|| format!("text extraction failed for {}", filename))?;
        tracing::info!(filename, pages = pages.len(), "extracted pages");

        let mut report = IngestReport::default();
        for page in &pages {
            let pieces = chunk_text(&page.text, self.chunking.chunk_size, self.chunking.overlap);
            for (idx, text) in pieces.into_iter().enumerate() {
                let chunk = Chunk::new(filename, page.number, idx, text);
                match self.embed_and_index(&chunk).await {
                    Ok(()) => report.indexed += 1,
                    Err(e) => {
                        tracing::warn!(
                            chunk_id = %chunk.chunk_id,
                            error = %e,
                            "chunk failed, continuing with the rest"
                        );
                        report.failed += 1;
                    }
                }
            }
        }

        tracing::info!(
            filename,
            indexed = report.indexed,
            failed = report.failed,
            "ingestion finished"
        );
        Ok(report)
    }

    async fn embed_and_index(&self, chunk: &Chunk) -> Result<()> {
        let vector = self.embedder.embed(&chunk.text).await?;
        let indexed = IndexedChunk {
            chunk: chunk.clone(),
            vector,
        };
        self.index.index_chunk(&indexed).await
    }

    /// Process a bucket notification: fetch each recorded object from
    /// storage and ingest it. Non-PDF keys are skipped. Returns the
    /// aggregate report across all records.
    pub async fn ingest_event(
        &self,
        event: &StorageEvent,
        store: &dyn ObjectStore,
    ) -> Result<IngestReport> {
        let mut report = IngestReport::default();

        for record in &event.records {
            let key = unquote_plus(&record.s3.object.key);
            let filename = filename_from_key(&key);

            if !filename.to_lowercase().ends_with(".pdf") {
                tracing::info!(key = %key, "skipping non-PDF object");
                continue;
            }

            tracing::info!(bucket = %record.s3.bucket.name, key = %key, "processing storage event");
            let bytes = store.get_object(&key).await?;
            let doc_report = self.ingest_document(&filename, &bytes).await?;
            report.merge(doc_report);
        }

        Ok(report)
    }
}

/// Last path segment of an object key.
pub fn filename_from_key(key: &str) -> String {
    key.rsplit('/').next().unwrap_or(key).to_string()
}

/// Decode an object key as it appears in bucket notifications, where
/// spaces arrive as `+` and other bytes are percent-encoded.
pub fn unquote_plus(key: &str) -> String {
    let mut out: Vec<u8> = Vec::with_capacity(key.len());
    let bytes = key.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len()
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit() =>
            {
                let hi = (bytes[i + 1] as char).to_digit(16).unwrap_or(0) as u8;
                let lo = (bytes[i + 2] as char).to_digit(16).unwrap_or(0) as u8;
                out.push(hi << 4 | lo);
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_deserializes_bucket_and_key() {
        let json = r#"{
            "Records": [
                {"s3": {"bucket": {"name": "docs"}, "object": {"key": "uploads/annual+report.pdf"}}}
            ]
        }"#;
        let event: StorageEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.records.len(), 1);
        assert_eq!(event.records[0].s3.bucket.name, "docs");
        assert_eq!(event.records[0].s3.object.key, "uploads/annual+report.pdf");
    }

    #[test]
    fn unquote_plus_decodes_spaces_and_percent_sequences() {
        assert_eq!(unquote_plus("annual+report.pdf"), "annual report.pdf");
        assert_eq!(unquote_plus("q1%202026.pdf"), "q1 2026.pdf");
        assert_eq!(unquote_plus("plain.pdf"), "plain.pdf");
        // Dangling percent is passed through untouched.
        assert_eq!(unquote_plus("odd%2"), "odd%2");
    }

    #[test]
    fn filename_is_last_segment() {
        assert_eq!(filename_from_key("uploads/2026/report.pdf"), "report.pdf");
        assert_eq!(filename_from_key("report.pdf"), "report.pdf");
    }
}

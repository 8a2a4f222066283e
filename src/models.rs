//! Core data models used throughout the ingestion and query pipelines.
//!
//! Pages and chunks are transient, scoped to a single ingestion call.
//! Search results, citations, and answers are transient, scoped to a single
//! query. Indexed chunks live in the external vector index.

use serde::Serialize;

/// A single page of cleaned text extracted from a PDF.
#[derive(Debug, Clone)]
pub struct Page {
    /// 1-based page number.
    pub number: u32,
    /// Cleaned page text (whitespace normalized).
    pub text: String,
}

/// A bounded, possibly overlapping substring of a page — the retrieval unit.
///
/// `chunk_id` is deterministic: `{filename}_p{page}_c{index}`, unique within
/// a document and ordered by reading position.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub chunk_id: String,
    pub filename: String,
    pub page: u32,
    pub text: String,
}

impl Chunk {
    pub fn new(filename: &str, page: u32, index: usize, text: String) -> Self {
        Self {
            chunk_id: format!("{}_p{}_c{}", filename, page, index),
            filename: filename.to_string(),
            page,
            text,
        }
    }
}

/// A chunk paired with its embedding vector, ready to be written to the index.
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// One hit returned from a vector search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub text: String,
    pub filename: String,
    pub page: u32,
    pub score: f64,
    pub chunk_id: String,
}

/// A `(filename, page)` reference substantiating part of an answer.
///
/// `url` is a time-limited access link to the source document; it is omitted
/// from serialized output when link generation was unavailable or failed.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Citation {
    pub filename: String,
    pub page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Citation {
    pub fn new(filename: &str, page: u32) -> Self {
        Self {
            filename: filename.to_string(),
            page,
            url: None,
        }
    }
}

/// A synthesized answer with its supporting citations.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub question: String,
    pub answer: String,
    pub sources: Vec<Citation>,
}

/// One row of the document catalog.
///
/// `page_count` is the maximum page number observed among indexed chunks,
/// not a count of distinct pages: a trailing page that produced no
/// qualifying chunks is not reflected.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub filename: String,
    pub chunk_count: u64,
    pub page_count: u32,
}

/// Aggregate outcome of ingesting one or more documents.
///
/// Per-chunk embedding and index-write failures are counted here rather than
/// aborting the document.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestReport {
    pub indexed: usize,
    pub failed: usize,
}

impl IngestReport {
    pub fn merge(&mut self, other: IngestReport) {
        self.indexed += other.indexed;
        self.failed += other.failed;
    }
}

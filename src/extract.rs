//! Per-page PDF text extraction with cleaning.
//!
//! Produces one [`Page`] per PDF page that still carries meaningful text
//! after normalization. A document that cannot be parsed at all is an
//! [`ExtractError`] — fatal to that document's ingestion, since no partial
//! extraction is useful downstream.

use regex::Regex;
use std::sync::OnceLock;

use crate::models::Page;

/// Pages whose cleaned text is at most this long are treated as noise
/// (blank pages, page numbers, scan artifacts) and dropped.
pub const MIN_PAGE_CHARS: usize = 100;

/// Whole-document extraction failure.
#[derive(Debug)]
pub enum ExtractError {
    Pdf(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extract cleaned text from each page of a PDF held in memory.
///
/// Page numbers are 1-based and refer to positions in the source document;
/// dropped noise pages leave holes in the sequence, not renumbering.
pub fn extract_pages(bytes: &[u8]) -> Result<Vec<Page>, ExtractError> {
    let raw_pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;

    let mut pages = Vec::new();
    for (i, raw) in raw_pages.iter().enumerate() {
        let text = clean_page_text(raw);
        if text.len() > MIN_PAGE_CHARS {
            pages.push(Page {
                number: (i + 1) as u32,
                text,
            });
        }
    }
    Ok(pages)
}

/// Normalize extracted text: trim, collapse runs of spaces, and collapse
/// three or more consecutive newlines to a paragraph break.
pub fn clean_page_text(raw: &str) -> String {
    static RE_SPACES: OnceLock<Regex> = OnceLock::new();
    static RE_NEWLINES: OnceLock<Regex> = OnceLock::new();
    let re_spaces = RE_SPACES.get_or_init(|| Regex::new(r" +").unwrap());
    let re_newlines = RE_NEWLINES.get_or_init(|| Regex::new(r"\n{3,}").unwrap());

    let text = raw.trim();
    let text = re_spaces.replace_all(text, " ");
    re_newlines.replace_all(&text, "\n\n").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_pages(b"not a pdf").unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn cleaning_collapses_spaces() {
        assert_eq!(clean_page_text("a    b  c"), "a b c");
    }

    #[test]
    fn cleaning_collapses_newline_runs_to_paragraph_breaks() {
        assert_eq!(clean_page_text("one\n\n\n\ntwo\n\nthree"), "one\n\ntwo\n\nthree");
    }

    #[test]
    fn cleaning_trims_edges() {
        assert_eq!(clean_page_text("  body  \n"), "body");
    }
}

//! Sentence-boundary-aware overlapping text chunker.
//!
//! Splits page text into windows of roughly `chunk_size` characters with
//! `overlap` characters shared between adjacent chunks, so no sentence is
//! split across a retrieval boundary without some shared context.
//!
//! # Algorithm
//!
//! 1. If the text fits in one chunk, return it whole (still filtered).
//! 2. Otherwise take a tentative cut at `start + chunk_size` and scan the
//!    last [`BOUNDARY_WINDOW`] characters before it for a break, trying in
//!    order: sentence-ending punctuation followed by whitespace, a blank
//!    line, any newline. The last match of the first pattern that matches
//!    anything wins; if none match, the raw cut stands.
//! 3. Trim the chunk and keep it only if it carries meaningful content
//!    (more than [`MIN_CHUNK_CHARS`] characters and [`MIN_CHUNK_WORDS`]
//!    words). Rejected fragments are dropped, not retried.
//! 4. Advance to `end - overlap` while text remains, else to `end`.

use regex::Regex;
use std::sync::OnceLock;

/// How far back from the tentative cut to look for a boundary.
const BOUNDARY_WINDOW: usize = 200;
/// Minimum character length for a chunk to be retained.
pub const MIN_CHUNK_CHARS: usize = 100;
/// Minimum word count for a chunk to be retained.
pub const MIN_CHUNK_WORDS: usize = 20;

fn boundary_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"[.!?]\s+").unwrap(),
            Regex::new(r"\n\n").unwrap(),
            Regex::new(r"\n").unwrap(),
        ]
    })
}

/// Split `text` into overlapping chunks that pass the content filter.
///
/// The output count can be lower than `len(text) / chunk_size`: windows
/// that trim down to fewer than [`MIN_CHUNK_CHARS`] characters or
/// [`MIN_CHUNK_WORDS`] words are silently discarded.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if text.len() <= chunk_size {
        return filter_chunk(text).into_iter().collect();
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < text.len() {
        let mut end = snap_to_char_boundary(text, (start + chunk_size).min(text.len()));

        if end < text.len() {
            let search_start =
                snap_to_char_boundary(text, start.max(end.saturating_sub(BOUNDARY_WINDOW)));
            let window = &text[search_start..end];
            for pattern in boundary_patterns() {
                if let Some(m) = pattern.find_iter(window).last() {
                    end = search_start + m.end();
                    break;
                }
            }
        }

        if let Some(chunk) = filter_chunk(&text[start..end]) {
            chunks.push(chunk);
        }

        if end < text.len() {
            let next = snap_to_char_boundary(text, end.saturating_sub(overlap));
            // A boundary very close to the window start could otherwise
            // yield a non-advancing step.
            start = if next > start { next } else { end };
        } else {
            start = end;
        }
    }

    chunks
}

/// Trim a window and keep it only if it passes the length and word filters.
fn filter_chunk(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.len() > MIN_CHUNK_CHARS && trimmed.split_whitespace().count() > MIN_CHUNK_WORDS {
        Some(trimmed.to_string())
    } else {
        None
    }
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn snap_to_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A paragraph of ordinary prose, ~120 chars / ~23 words.
    fn sentence(n: usize) -> String {
        format!(
            "This is sentence number {} of the sample document and it keeps \
             going with a few more words so the filters are satisfied here. ",
            n
        )
    }

    #[test]
    fn short_text_returns_single_chunk() {
        let text = sentence(1) + &sentence(2);
        let chunks = chunk_text(&text, 1000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], text.trim());
    }

    #[test]
    fn short_text_below_filter_is_dropped() {
        let chunks = chunk_text("Too short to matter.", 1000, 200);
        assert!(chunks.is_empty());
    }

    #[test]
    fn long_word_run_fails_word_filter() {
        // Over 100 chars but fewer than 20 words.
        let text = "antidisestablishmentarianism ".repeat(8);
        assert!(text.len() > MIN_CHUNK_CHARS);
        assert!(chunk_text(&text, 1000, 200).is_empty());
    }

    #[test]
    fn long_text_produces_overlapping_chunks() {
        let text: String = (0..30).map(sentence).collect();
        let chunks = chunk_text(&text, 1000, 200);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() > MIN_CHUNK_CHARS);
            assert!(chunk.split_whitespace().count() > MIN_CHUNK_WORDS);
        }
        // Adjacent chunks share text from the overlap region.
        for pair in chunks.windows(2) {
            let tail: String = pair[0]
                .chars()
                .rev()
                .take(40)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            assert!(
                pair[1].contains(tail.trim()),
                "expected overlap between consecutive chunks"
            );
        }
    }

    #[test]
    fn cuts_prefer_sentence_boundaries() {
        let text: String = (0..30).map(sentence).collect();
        let chunks = chunk_text(&text, 1000, 200);
        for chunk in &chunks[..chunks.len() - 1] {
            let last = chunk.chars().last().unwrap();
            assert!(
                matches!(last, '.' | '!' | '?'),
                "chunk should end at sentence punctuation, got {:?}",
                last
            );
        }
    }

    #[test]
    fn newline_boundary_used_when_no_sentence_end() {
        // No sentence punctuation anywhere; lines inside the scan window.
        let line = "word ".repeat(30).trim_end().to_string();
        let text = format!("{}\n", line).repeat(12);
        let chunks = chunk_text(&text, 400, 100);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            // Each chunk is made of whole lines.
            assert!(!chunk.ends_with("wor"));
        }
    }

    #[test]
    fn raw_cut_when_no_boundary_in_window() {
        // A single unbroken run of words with no punctuation or newlines
        // still terminates and yields chunks at the raw cut points.
        let text = "lorem ipsum dolor sit amet consectetur adipiscing elit sed "
            .repeat(40)
            .replace('\n', " ");
        let chunks = chunk_text(&text, 500, 100);
        assert!(chunks.len() > 1);
    }

    #[test]
    fn round_trip_within_overlap_tolerance() {
        // Every character of the source appears in some chunk: walking the
        // chunks and matching each at its position in the original covers
        // the full text modulo boundary trimming.
        let text: String = (0..25).map(sentence).collect();
        let chunks = chunk_text(&text, 800, 150);
        let mut covered_to = 0usize;
        for chunk in &chunks {
            let pos = text.find(chunk.as_str()).expect("chunk not in source");
            assert!(pos <= covered_to, "gap before chunk at byte {}", pos);
            covered_to = covered_to.max(pos + chunk.len());
        }
        // Only boundary whitespace may remain uncovered at the tail.
        assert!(text[covered_to..].trim().is_empty());
    }

    #[test]
    fn multibyte_text_never_panics() {
        let text = "Ün éxample with ümlauts and accents. ".repeat(60);
        let chunks = chunk_text(&text, 500, 100);
        assert!(!chunks.is_empty());
    }

    #[test]
    fn deterministic() {
        let text: String = (0..20).map(sentence).collect();
        assert_eq!(chunk_text(&text, 1000, 200), chunk_text(&text, 1000, 200));
    }
}

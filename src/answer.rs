//! Answer synthesis and citation handling.
//!
//! Builds the grounded prompt from retrieved chunks, calls the chat
//! model, and extracts source citations from the completion. The model
//! is instructed to end its answer with a `SOURCES:` block listing the
//! documents it drew from; when it does not comply, citations fall back
//! to the top retrieved chunks so an answer never ships unsourced.

use regex::Regex;
use std::sync::OnceLock;

use crate::chat::ChatModel;
use crate::models::{Citation, SearchResult};

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions based on the provided document excerpts. \
Answer using ONLY the information in the excerpts. If the excerpts do not contain enough \
information to answer, say so clearly.\n\n\
After your answer, list the sources you used on a final section in exactly this format:\n\
SOURCES:\n\
- filename.pdf, Page N\n\
- other.pdf, Page M\n\n\
List each source only once.";

/// Join retrieved chunks into the context block of the user message,
/// each prefixed with its provenance so the model can cite it.
pub fn build_user_message(question: &str, results: &[SearchResult]) -> String {
    let context: Vec<String> = results
        .iter()
        .map(|r| {
            format!(
                "[Source: {}, Page {}, Relevance: {:.2}]\n{}",
                r.filename, r.page, r.score, r.text
            )
        })
        .collect();

    format!(
        "Document excerpts:\n\n{}\n\nQuestion: {}",
        context.join("\n\n"),
        question
    )
}

fn citation_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)-\s*([^,\n]+\.pdf)\s*,\s*Page\s*(\d+)").unwrap())
}

/// Split a completion into the answer body and any citations the model
/// declared in its `SOURCES:` block. Returns the full text with no
/// citations when the marker is absent.
pub fn parse_answer(completion: &str) -> (String, Vec<Citation>) {
    let Some(marker) = find_sources_marker(completion) else {
        return (completion.trim().to_string(), Vec::new());
    };

    let (body, sources_block) = completion.split_at(marker);
    let sources_block = &sources_block["SOURCES:".len()..];

    let mut citations = Vec::new();
    for line in sources_block.lines() {
        if let Some(caps) = citation_line_re().captures(line) {
            let filename = caps
                .get(1)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            let page = caps
                .get(2)
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .unwrap_or(0);
            if filename.is_empty() || page == 0 {
                continue;
            }
            citations.push(Citation::new(&filename, page));
        }
    }

    (body.trim().to_string(), citations)
}

fn find_sources_marker(completion: &str) -> Option<usize> {
    completion.find("SOURCES:")
}

/// Cite the top retrieved chunks when the model supplied no sources.
/// Duplicate (filename, page) pairs collapse to their first occurrence
/// before the cut, so `n` distinct locations come back when available.
pub fn fallback_citations(results: &[SearchResult], n: usize) -> Vec<Citation> {
    let mut citations: Vec<Citation> = Vec::new();
    for r in results {
        let citation = Citation::new(&r.filename, r.page);
        if !citations.contains(&citation) {
            citations.push(citation);
        }
        if citations.len() == n {
            break;
        }
    }
    citations
}

/// Generate an answer for the question over the retrieved chunks.
pub async fn synthesize(
    chat: &dyn ChatModel,
    question: &str,
    results: &[SearchResult],
) -> anyhow::Result<(String, Vec<Citation>)> {
    let user = build_user_message(question, results);
    let completion = chat.complete(SYSTEM_PROMPT, &user).await?;
    Ok(parse_answer(&completion))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(filename: &str, page: u32, score: f64) -> SearchResult {
        SearchResult {
            text: format!("text from {} page {}", filename, page),
            filename: filename.to_string(),
            page,
            score,
            chunk_id: format!("{}_p{}_c0", filename, page),
        }
    }

    #[test]
    fn parses_sources_block() {
        let completion =
            "Answer here.\n\nSOURCES:\n- report.pdf, Page 3\n- report.pdf, Page 5";
        let (answer, citations) = parse_answer(completion);
        assert_eq!(answer, "Answer here.");
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].filename, "report.pdf");
        assert_eq!(citations[0].page, 3);
        assert_eq!(citations[1].page, 5);
    }

    #[test]
    fn missing_marker_returns_whole_text_uncited() {
        let (answer, citations) = parse_answer("Just an answer with no sources.");
        assert_eq!(answer, "Just an answer with no sources.");
        assert!(citations.is_empty());
    }

    #[test]
    fn citation_lines_are_case_insensitive_and_kept_in_order() {
        // The parser reports what the model declared, repeats included;
        // deduplication belongs to the fallback path only.
        let completion =
            "Body.\n\nSOURCES:\n- Report.PDF, page 3\n- Report.PDF, page 3\nnot a citation line";
        let (_, citations) = parse_answer(completion);
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].filename, "Report.PDF");
        assert_eq!(citations[0].page, 3);
        assert_eq!(citations[1], citations[0]);
    }

    #[test]
    fn fallback_dedups_before_taking_n() {
        let results = vec![
            result("a.pdf", 1, 0.9),
            result("a.pdf", 1, 0.8),
            result("b.pdf", 2, 0.7),
            result("c.pdf", 3, 0.6),
        ];
        let citations = fallback_citations(&results, 3);
        assert_eq!(citations.len(), 3);
        assert_eq!(citations[0].filename, "a.pdf");
        assert_eq!(citations[1].filename, "b.pdf");
        assert_eq!(citations[2].filename, "c.pdf");
    }

    #[test]
    fn fallback_handles_fewer_results_than_requested() {
        let results = vec![result("a.pdf", 1, 0.9)];
        let citations = fallback_citations(&results, 3);
        assert_eq!(citations.len(), 1);
    }

    #[test]
    fn user_message_carries_provenance_headers() {
        let results = vec![result("report.pdf", 3, 0.915)];
        let msg = build_user_message("What changed?", &results);
        assert!(msg.contains("[Source: report.pdf, Page 3, Relevance: 0.92]"));
        assert!(msg.ends_with("Question: What changed?"));
    }
}

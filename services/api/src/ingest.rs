//! services/api/src/ingest.rs
//!
//! Turns an uploaded document into the two persisted shapes the chat
//! controller consumes: fixed-size knowledge chunks and an explicit ordered
//! topic list. The topic list is derived here, once, at ingestion time so
//! the phase classifier never has to re-derive curriculum order from free
//! text on the hot path.

use regex::Regex;
use std::sync::OnceLock;

/// Chunk size, in bytes, for ingested document text.
pub const CHUNK_SIZE: usize = 4_000;

/// Upper bound on the derived curriculum length.
const MAX_TOPICS: usize = 40;

/// Splits text into chunks of at most `chunk_size` bytes, never splitting a
/// UTF-8 character. Insertion order is the reconstitution order.
pub fn chunk_text(text: &str, chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < text.len() {
        let mut end = (start + chunk_size).min(text.len());
        while end < text.len() && !text.is_char_boundary(end) {
            end -= 1;
        }
        chunks.push(text[start..end].to_string());
        start = end;
    }
    chunks
}

fn heading_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // "1. Topic title" / "2) Topic title"
            Regex::new(r"^\s*\d{1,2}[.)]\s+(.{3,80})$").unwrap(),
            // Markdown-style headings
            Regex::new(r"^#{1,3}\s+(.{3,80})$").unwrap(),
            // "Step 3: Topic title"
            Regex::new(r"(?i)^\s*step\s+\d{1,2}\s*[:.-]\s+(.{3,80})$").unwrap(),
        ]
    })
}

/// Extracts an ordered topic list from document text by a heading heuristic:
/// numbered lines, markdown headings, and "Step N:" lines, in document
/// order, deduplicated case-insensitively.
pub fn derive_topics(text: &str) -> Vec<String> {
    let mut topics: Vec<String> = Vec::new();
    let mut seen: Vec<String> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim_end();
        let title = heading_patterns()
            .iter()
            .find_map(|pattern| pattern.captures(trimmed))
            .map(|captures| normalize_title(&captures[1]));

        if let Some(title) = title {
            if title.is_empty() {
                continue;
            }
            let key = title.to_lowercase();
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);
            topics.push(title);
            if topics.len() == MAX_TOPICS {
                break;
            }
        }
    }

    topics
}

fn normalize_title(raw: &str) -> String {
    raw.trim()
        .trim_end_matches([':', '.', '-'])
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_respect_the_size_bound_and_reassemble() {
        let text = "abcdefghij".repeat(100); // 1000 bytes
        let chunks = chunk_text(&text, 256);
        assert!(chunks.iter().all(|c| c.len() <= 256));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn chunking_never_splits_a_multibyte_character() {
        let text = "é".repeat(300); // 2 bytes each
        let chunks = chunk_text(&text, 5);
        assert_eq!(chunks.concat(), text);
        for chunk in chunks {
            assert!(chunk.len() <= 5);
            assert!(std::str::from_utf8(chunk.as_bytes()).is_ok());
        }
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_text("", CHUNK_SIZE).is_empty());
    }

    #[test]
    fn derives_numbered_and_markdown_headings_in_document_order() {
        let text = "Intro paragraph about the mentor.\n\
                    1. What makes a good business\n\
                    Some body text.\n\
                    2) Decision principles\n\
                    ## Risk rules\n\
                    Step 4: Red flags\n\
                    more prose";
        let topics = derive_topics(text);
        assert_eq!(
            topics,
            vec![
                "What makes a good business",
                "Decision principles",
                "Risk rules",
                "Red flags",
            ]
        );
    }

    #[test]
    fn duplicate_headings_are_kept_once() {
        let text = "1. Pricing\n2. Marketing\n1. Pricing";
        assert_eq!(derive_topics(text), vec!["Pricing", "Marketing"]);
    }

    #[test]
    fn prose_without_headings_yields_no_topics() {
        let text = "Just a plain paragraph with no structure to speak of.";
        assert!(derive_topics(text).is_empty());
    }
}

//! crates/mentor_core/src/knowledge.rs
//!
//! Assembles a mentor's ingested document chunks into a single knowledge
//! context string.

use crate::domain::KnowledgeChunk;

/// Concatenates chunk contents in insertion order with a paragraph
/// separator. An empty result is valid; the prompt composer renders it as
/// "no domain knowledge available". Truncation, if any, is the composer's
/// policy, not this function's.
pub fn assemble(chunks: &[KnowledgeChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

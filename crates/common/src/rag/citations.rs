//! Human-readable reference block for evidence chunks

use crate::models::EvidenceChunk;

/// Characters of chunk content shown under each reference
pub const CITATION_PREVIEW_CHARS: usize = 200;

const REFERENCES_HEADER: &str = "\n\n---\n**References:**";

/// Render evidence chunks as a numbered references block.
///
/// Empty input renders as the empty string. Otherwise each chunk gets a
/// `[i] <source>` line (1-based, input order) with ` (p.<page>)` when a
/// page is known, followed by the first [`CITATION_PREVIEW_CHARS`]
/// characters of its content and `...`.
pub fn format_citations(chunks: &[EvidenceChunk]) -> String {
    if chunks.is_empty() {
        return String::new();
    }

    let mut parts: Vec<String> = Vec::with_capacity(chunks.len() * 2 + 1);
    parts.push(REFERENCES_HEADER.to_string());

    for (i, chunk) in chunks.iter().enumerate() {
        let mut header = format!("\n[{}] {}", i + 1, chunk.source_label());
        if let Some(page) = chunk.page() {
            header.push_str(&format!(" (p.{})", page));
        }
        parts.push(header);

        let preview: String = chunk.content.chars().take(CITATION_PREVIEW_CHARS).collect();
        if !preview.is_empty() {
            parts.push(format!("    {}...", preview));
        }
    }

    parts.join("\n")
}

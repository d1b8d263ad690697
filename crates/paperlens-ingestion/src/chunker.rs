//! Page-aware text chunking for model context limits.

use crate::pdf_parser::PAGE_MARKER;

/// Characters per chunk sent to Anthropic models.
pub const ANTHROPIC_MAX_CHARS: usize = 100_000;
/// Characters per chunk sent to OpenAI models.
pub const OPENAI_MAX_CHARS: usize = 80_000;

/// Split extracted text into chunks of at most `max_chars` characters,
/// breaking only at page markers. Whole pages are packed greedily; a single
/// page longer than `max_chars` becomes its own oversized chunk. Text that
/// fits is returned as one chunk. Never returns an empty chunk.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    for piece in page_pieces(text) {
        let piece_chars = piece.chars().count();
        if current_chars > 0 && current_chars + piece_chars > max_chars {
            push_chunk(&mut chunks, std::mem::take(&mut current));
            current_chars = 0;
        }
        current.push_str(piece);
        current_chars += piece_chars;
    }
    push_chunk(&mut chunks, current);

    chunks
}

fn push_chunk(chunks: &mut Vec<String>, chunk: String) {
    if !chunk.trim().is_empty() {
        chunks.push(chunk);
    }
}

/// Slices of `text` each starting at a page marker. Any text before the
/// first marker forms its own slice.
fn page_pieces(text: &str) -> Vec<&str> {
    let mut starts: Vec<usize> = text.match_indices(PAGE_MARKER).map(|(i, _)| i).collect();
    if starts.first() != Some(&0) {
        starts.insert(0, 0);
    }
    starts
        .iter()
        .enumerate()
        .map(|(n, &start)| {
            let end = starts.get(n + 1).copied().unwrap_or(text.len());
            &text[start..end]
        })
        .collect()
}

/// Rough token count: one token per four characters.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

//! Text segmentation into bounded-size chunks.
//!
//! Chunks are contiguous substrings of the input — nothing is inserted or
//! dropped, so concatenating the chunk texts reproduces the input exactly.
//! Split points are chosen by priority: paragraph boundary, then sentence
//! boundary, then whole-unit emission when a single sentence alone exceeds
//! the limit (oversized beats corrupted mid-word).

use serde::Serialize;

/// A bounded slice of source text.
///
/// Ordering is significant: the progressive summarizer threads a running
/// summary from each chunk into the next.
#[derive(Debug, Clone, Serialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    /// Filled in by the progressive summarizer.
    pub summary: Option<String>,
}

impl Chunk {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
            summary: None,
        }
    }
}

/// Split `text` into ordered chunks of at most `max_chars` characters.
///
/// A chunk may exceed `max_chars` only when one atomic sentence does.
/// Whitespace-only input yields no chunks.
pub fn segment(text: &str, max_chars: usize) -> Vec<Chunk> {
    if text.trim().is_empty() || max_chars == 0 {
        return Vec::new();
    }

    let mut pieces: Vec<&str> = Vec::new();
    for paragraph in split_paragraphs(text) {
        if paragraph.chars().count() <= max_chars {
            pieces.push(paragraph);
        } else {
            pieces.extend(split_sentences(paragraph));
        }
    }

    // Greedy packing: consecutive pieces stay together while they fit.
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut start: Option<usize> = None;
    let mut current_len = 0usize;

    let base = text.as_ptr() as usize;
    let offset_of = |piece: &str| piece.as_ptr() as usize - base;

    for piece in &pieces {
        let piece_len = piece.chars().count();
        match start {
            Some(_) if current_len + piece_len <= max_chars => {
                current_len += piece_len;
            }
            Some(s) => {
                let end = offset_of(piece);
                chunks.push(Chunk::new(chunks.len(), &text[s..end]));
                start = Some(end);
                current_len = piece_len;
            }
            None => {
                start = Some(offset_of(piece));
                current_len = piece_len;
            }
        }
    }

    if let Some(s) = start {
        chunks.push(Chunk::new(chunks.len(), &text[s..]));
    }

    chunks
}

/// Split into paragraphs, each keeping its trailing blank-line separator so
/// the pieces tile the input without gaps.
fn split_paragraphs(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\n' {
            // A blank line (possibly with \r) ends the paragraph; the
            // separator stays attached to the piece before it.
            let mut j = i + 1;
            while j < bytes.len() && (bytes[j] == b'\n' || bytes[j] == b'\r') {
                j += 1;
            }
            if j > i + 1 {
                pieces.push(&text[start..j]);
                start = j;
                i = j;
                continue;
            }
        }
        i += 1;
    }

    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

/// Split a paragraph into sentences. A terminator (`.`, `!`, `?`) followed
/// by whitespace ends a sentence; the whitespace stays with it.
fn split_sentences(paragraph: &str) -> Vec<&str> {
    let bytes = paragraph.as_bytes();
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if matches!(bytes[i], b'.' | b'!' | b'?') {
            let mut j = i + 1;
            // Swallow any run of terminators ("..." / "?!") first.
            while j < bytes.len() && matches!(bytes[j], b'.' | b'!' | b'?') {
                j += 1;
            }
            if j >= bytes.len() || bytes[j].is_ascii_whitespace() {
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                pieces.push(&paragraph[start..j]);
                start = j;
                i = j;
                continue;
            }
            i = j;
            continue;
        }
        i += 1;
    }

    if start < paragraph.len() {
        pieces.push(&paragraph[start..]);
    }
    pieces
}

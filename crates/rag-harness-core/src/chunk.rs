//! Sentence-grouping text chunker.
//!
//! Splits extracted document text into [`Chunk`]s of a fixed number of
//! sentences. A chunk boundary never falls inside a sentence.
//!
//! # Algorithm
//!
//! 1. Trim the text. If nothing is left, fail with
//!    [`RagError::NoExtractableContent`].
//! 2. Split into sentences at every whitespace run that directly follows
//!    terminal punctuation (`.`, `?` or `!`). The whitespace run is dropped.
//! 3. Group consecutive sentences `chunk_size` at a time, joining each group
//!    with single spaces.
//! 4. A trailing group shorter than `chunk_size` becomes the last chunk.
//!
//! For `S` sentences this yields `ceil(S / chunk_size)` chunks.
//!
//! # Example
//!
//! ```rust
//! use rag_harness_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("One. Two? Three! Four.", 3).unwrap();
//! assert_eq!(chunks.len(), 2);
//! assert_eq!(chunks[0].text, "One. Two? Three!");
//! assert_eq!(chunks[1].text, "Four.");
//! ```

use crate::error::{RagError, Result};
use crate::models::Chunk;

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '?' | '!')
}

/// Split text into sentences on terminal punctuation followed by whitespace.
///
/// Whitespace inside a sentence (including newlines not preceded by
/// punctuation) is preserved. Returns an empty vector for blank input.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let text = text.trim();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut prev: Option<char> = None;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c.is_whitespace() && prev.is_some_and(is_terminal) {
            sentences.push(&text[start..i]);
            let mut end = i + c.len_utf8();
            while let Some(&(j, w)) = chars.peek() {
                if !w.is_whitespace() {
                    break;
                }
                end = j + w.len_utf8();
                chars.next();
            }
            start = end;
            prev = None;
            continue;
        }
        prev = Some(c);
    }

    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

/// Split text into chunks of `chunk_size` sentences.
///
/// # Errors
///
/// - [`RagError::InvalidArgument`] if `chunk_size` is zero.
/// - [`RagError::NoExtractableContent`] if the text is blank.
///
/// # Guarantees
///
/// - Chunk indices are contiguous: `0, 1, 2, …, N-1`, in document order.
/// - Every chunk but the last holds exactly `chunk_size` sentences.
pub fn chunk_text(text: &str, chunk_size: usize) -> Result<Vec<Chunk>> {
    if chunk_size == 0 {
        return Err(RagError::invalid("chunk_size must be a positive integer"));
    }

    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return Err(RagError::NoExtractableContent);
    }

    Ok(sentences
        .chunks(chunk_size)
        .enumerate()
        .map(|(index, group)| Chunk {
            index,
            text: group.join(" "),
            sentence_count: group.len(),
        })
        .collect())
}

//! Recursive character text splitter.
//!
//! Splits corpus text into overlapping [`Chunk`]s of at most `chunk_size`
//! characters. The splitter prefers large semantic boundaries and only
//! falls back to finer ones when a piece is still too long:
//!
//! 1. paragraphs (`"\n\n"`)
//! 2. lines (`"\n"`)
//! 3. words (`" "`)
//! 4. single characters (`""`)
//!
//! # Algorithm
//!
//! 1. Pick the first separator that occurs in the text.
//! 2. Split on it, keeping each separator attached to the start of the
//!    piece that follows it.
//! 3. Greedily merge consecutive pieces while the running length stays
//!    within `chunk_size`. When a chunk is emitted, drop pieces from the
//!    front of the window until at most `chunk_overlap` characters remain;
//!    those carry over into the next chunk.
//! 4. Any piece that is itself `chunk_size` characters or longer is split
//!    recursively with the remaining, finer separators.
//! 5. Every emitted chunk is whitespace-trimmed; empty chunks are dropped.
//!
//! Lengths are measured in Unicode scalar values, so multi-byte text never
//! splits inside a character.
//!
//! # Example
//!
//! ```rust
//! use pdf_chat_core::chunk::RecursiveSplitter;
//!
//! let splitter = RecursiveSplitter::new(1000, 200).unwrap();
//! let chunks = splitter.split_text("First paragraph.\n\nSecond paragraph.");
//! assert_eq!(chunks, vec!["First paragraph.\n\nSecond paragraph.".to_string()]);
//! ```

use std::collections::VecDeque;

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};

use crate::models::Chunk;

/// Target chunk length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Characters shared between consecutive chunks.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Separators in order of preference, coarsest first.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Greedy splitter that recurses into finer separators for oversized pieces.
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveSplitter {
    /// Create a splitter with the default separator hierarchy.
    ///
    /// # Errors
    ///
    /// Returns an error if `chunk_size` is zero or `chunk_overlap` is larger
    /// than `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            bail!("chunk_size must be > 0");
        }
        if chunk_overlap > chunk_size {
            bail!(
                "chunk_overlap ({}) must not exceed chunk_size ({})",
                chunk_overlap,
                chunk_size
            );
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Split `text` into trimmed, non-empty chunks in document order.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut finer: &[String] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in split_keep_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge_pieces(&pending));
                pending.clear();
            }

            if finer.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge_pieces(&pending));
        }

        chunks
    }

    /// Merge pieces shorter than `chunk_size` into overlapping windows.
    fn merge_pieces(&self, pieces: &[&str]) -> Vec<String> {
        let mut out = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);

            if total + len > self.chunk_size && !window.is_empty() {
                if let Some(joined) = join_window(&window) {
                    out.push(joined);
                }
                // Keep at most `chunk_overlap` characters, and always enough
                // room for the incoming piece.
                while total > self.chunk_overlap || (total > 0 && total + len > self.chunk_size) {
                    match window.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }

            window.push_back((piece, len));
            total += len;
        }

        if let Some(joined) = join_window(&window) {
            out.push(joined);
        }

        out
    }
}

impl Default for RecursiveSplitter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Split the full corpus into indexed, hashed [`Chunk`]s.
///
/// Indices are contiguous from 0. Each chunk's `hash` is the SHA-256 of its
/// text, which lets the indexer recognise chunks it has already embedded.
pub fn chunk_corpus(text: &str, splitter: &RecursiveSplitter) -> Vec<Chunk> {
    splitter
        .split_text(text)
        .into_iter()
        .enumerate()
        .map(|(index, text)| make_chunk(index, text))
        .collect()
}

fn make_chunk(index: usize, text: String) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk { index, text, hash }
}

/// Split on `separator`, attaching each separator to the following piece.
/// An empty separator yields one piece per character.
fn split_keep_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (at, _) in text.match_indices(separator) {
        if at > start {
            pieces.push(&text[start..at]);
        }
        start = at;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn join_window(window: &VecDeque<(&str, usize)>) -> Option<String> {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

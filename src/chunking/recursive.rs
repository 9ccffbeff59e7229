//! Recursive character splitting.
//!
//! Splits on the coarsest separator present in the text (paragraph, line,
//! sentence, word, character) and only descends to finer separators for
//! pieces that are still too long. Pieces are then greedily merged back into
//! windows of at most `chunk_size` characters, carrying up to `chunk_overlap`
//! trailing characters into the next window.

use super::{ChunkingConfig, TextSplitter};
use crate::error::{Result, ScreenragError};
use std::collections::VecDeque;
use tracing::warn;

/// Separators in priority order. The empty separator splits into characters.
pub const DEFAULT_SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

/// Length in characters, which is what chunk sizes are measured in.
fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split `text` at every occurrence of `separator`, keeping the separator at the
/// start of the following piece. Pieces are contiguous slices of `text`.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;

    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }

    if start < text.len() {
        pieces.push(&text[start..]);
    }

    pieces
}

/// Recursive character text splitter.
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveSplitter {
    /// Create a splitter with the default separators.
    pub fn new(config: &ChunkingConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(ScreenragError::Chunking("chunk_size must be > 0".to_string()));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(ScreenragError::Chunking(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }

        Ok(Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    fn split_recursive(&self, text: &str, separators: &[String], out: &mut Vec<String>) {
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut finer: &[String] = &[];

        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate.as_str();
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut fitting: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }

            if !fitting.is_empty() {
                self.merge(&fitting, out);
                fitting.clear();
            }

            if finer.is_empty() {
                out.push(piece.to_string());
            } else {
                self.split_recursive(piece, finer, out);
            }
        }

        if !fitting.is_empty() {
            self.merge(&fitting, out);
        }
    }

    /// Greedily merge small pieces into windows, keeping an overlap tail.
    fn merge(&self, pieces: &[&str], out: &mut Vec<String>) {
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);

            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total, self.chunk_size
                    );
                }

                if !window.is_empty() {
                    Self::emit(&window, out);

                    while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                        match window.pop_front() {
                            Some(front) => total -= char_len(front),
                            None => break,
                        }
                    }
                }
            }

            window.push_back(piece);
            total += len;
        }

        Self::emit(&window, out);
    }

    fn emit(window: &VecDeque<&str>, out: &mut Vec<String>) {
        let joined: String = window.iter().copied().collect();
        let trimmed = joined.trim();
        if !trimmed.is_empty() {
            out.push(trimmed.to_string());
        }
    }
}

impl TextSplitter for RecursiveSplitter {
    fn split_text(&self, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        self.split_recursive(text, &self.separators, &mut out);
        out
    }
}

//! Chunking of scenes into overlapping retrieval windows.
//!
//! The splitter only produces window texts. Identifiers and per-scene
//! positions are assigned mechanically afterwards by [`chunk_scenes`].

mod recursive;

pub use recursive::{RecursiveSplitter, DEFAULT_SEPARATORS};

use crate::segmentation::Scene;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// A window of scene text, the unit that is embedded, indexed and retrieved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Corpus-wide ordinal, strictly increasing in emission order.
    pub chunk_id: u64,
    /// Parent film.
    pub film: String,
    /// Parent scene id.
    pub scene_id: u32,
    /// Parent scene heading.
    pub heading: String,
    /// 0-based position within the parent scene.
    pub chunk_index: u32,
    /// Number of chunks the parent scene produced.
    pub total_chunks: u32,
    /// Window text.
    pub text: String,
}

impl Chunk {
    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Window sizes, measured in characters.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    /// Maximum window length.
    pub chunk_size: usize,
    /// Characters shared by adjacent windows.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
        }
    }
}

/// Trait for text splitting strategies.
pub trait TextSplitter: Send + Sync {
    /// Split text into ordered windows. Empty input yields no windows.
    fn split_text(&self, text: &str) -> Vec<String>;
}

/// Chunk every scene, assigning corpus-wide ids in processing order.
pub fn chunk_scenes(scenes: &[Scene], splitter: &dyn TextSplitter) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut next_id: u64 = 0;

    for scene in scenes {
        let windows = splitter.split_text(&scene.text);
        let total = windows.len() as u32;

        for (index, text) in windows.into_iter().enumerate() {
            chunks.push(Chunk {
                chunk_id: next_id,
                film: scene.film.clone(),
                scene_id: scene.scene_id,
                heading: scene.heading.clone(),
                chunk_index: index as u32,
                total_chunks: total,
                text,
            });
            next_id += 1;
        }
    }

    debug!("Chunked {} scenes into {} chunks", scenes.len(), chunks.len());
    chunks
}

/// Length statistics for one film.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilmChunkStats {
    pub chunks: usize,
    pub avg_len: usize,
}

/// Length distribution of a chunk set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkStats {
    pub total: usize,
    pub avg_len: usize,
    pub min_len: usize,
    pub max_len: usize,
    pub by_film: BTreeMap<String, FilmChunkStats>,
}

impl ChunkStats {
    /// Compute statistics over a chunk set.
    pub fn from_chunks(chunks: &[Chunk]) -> Self {
        if chunks.is_empty() {
            return Self::default();
        }

        let lengths: Vec<usize> = chunks.iter().map(Chunk::char_len).collect();
        let mut per_film: BTreeMap<String, (usize, usize)> = BTreeMap::new();
        for (chunk, len) in chunks.iter().zip(&lengths) {
            let entry = per_film.entry(chunk.film.clone()).or_default();
            entry.0 += 1;
            entry.1 += len;
        }

        Self {
            total: chunks.len(),
            avg_len: lengths.iter().sum::<usize>() / lengths.len(),
            min_len: lengths.iter().copied().min().unwrap_or(0),
            max_len: lengths.iter().copied().max().unwrap_or(0),
            by_film: per_film
                .into_iter()
                .map(|(film, (count, sum))| {
                    (
                        film,
                        FilmChunkStats {
                            chunks: count,
                            avg_len: sum / count,
                        },
                    )
                })
                .collect(),
        }
    }
}

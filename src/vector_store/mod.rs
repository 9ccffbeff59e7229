//! Vector index abstraction for Screenrag.
//!
//! Entries live in named collections under cosine distance. A collection is
//! write-once per rebuild: it is deleted and recreated wholesale rather than
//! updated, and it records the embedding model and dimension it was built with.

mod memory;
mod sqlite;

pub use memory::MemoryVectorIndex;
pub use sqlite::SqliteVectorIndex;

use crate::chunking::Chunk;
use crate::error::{Result, ScreenragError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata of a named collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    /// Collection name.
    pub name: String,
    /// Embedding model the collection was built with.
    pub embedding_model: String,
    /// Embedding dimension the collection was built with.
    pub dimensions: usize,
    /// When the collection was created.
    pub created_at: DateTime<Utc>,
}

impl CollectionInfo {
    /// Fail unless `embedding` lives in this collection's embedding space.
    pub fn check_dimensions(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimensions {
            return Err(ScreenragError::EmbeddingMismatch(format!(
                "collection '{}' holds {}-dimensional vectors, got {}",
                self.name,
                self.dimensions,
                embedding.len()
            )));
        }
        Ok(())
    }
}

/// Per-entry metadata carried over from the chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub film: String,
    pub scene_id: u32,
    pub heading: String,
    pub chunk_index: u32,
    pub total_chunks: u32,
}

/// An indexed chunk: text, vector and metadata keyed by the chunk id.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedEntry {
    /// String form of the chunk id.
    pub id: String,
    /// Chunk text.
    pub document: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// Chunk metadata.
    pub metadata: EntryMetadata,
}

impl IndexedEntry {
    /// Build an entry from a chunk and its embedding.
    pub fn from_chunk(chunk: &Chunk, embedding: Vec<f32>) -> Self {
        Self {
            id: chunk.chunk_id.to_string(),
            document: chunk.text.clone(),
            embedding,
            metadata: EntryMetadata {
                film: chunk.film.clone(),
                scene_id: chunk.scene_id,
                heading: chunk.heading.clone(),
                chunk_index: chunk.chunk_index,
                total_chunks: chunk.total_chunks,
            },
        }
    }
}

/// A nearest-neighbour hit.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    pub id: String,
    pub document: String,
    pub metadata: EntryMetadata,
    /// Cosine distance to the query (0 = identical direction).
    pub distance: f32,
}

/// Trait for vector index implementations.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Look up a collection, `None` if it does not exist.
    async fn get_collection(&self, name: &str) -> Result<Option<CollectionInfo>>;

    /// Create an empty cosine-distance collection. Fails if it already exists.
    async fn create_collection(
        &self,
        name: &str,
        embedding_model: &str,
        dimensions: usize,
    ) -> Result<CollectionInfo>;

    /// Delete a collection and all its entries. Returns whether it existed.
    async fn delete_collection(&self, name: &str) -> Result<bool>;

    /// Add entries to a collection.
    async fn add(&self, collection: &str, entries: &[IndexedEntry]) -> Result<usize>;

    /// The `k` nearest entries in increasing distance order.
    async fn query(&self, collection: &str, embedding: &[f32], k: usize) -> Result<Vec<QueryHit>>;

    /// Number of entries in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;

    /// All entry ids in a collection, sorted.
    async fn ids(&self, collection: &str) -> Result<Vec<String>>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Cosine distance, `1 - cosine_similarity`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Rank candidate entries by distance to `embedding` and keep the nearest `k`.
pub(crate) fn rank_nearest<'a>(
    embedding: &[f32],
    entries: impl Iterator<Item = &'a IndexedEntry>,
    k: usize,
) -> Vec<QueryHit> {
    let mut hits: Vec<QueryHit> = entries
        .map(|entry| QueryHit {
            id: entry.id.clone(),
            document: entry.document.clone(),
            metadata: entry.metadata.clone(),
            distance: cosine_distance(embedding, &entry.embedding),
        })
        .collect();

    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(k);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_distance_is_one_minus_similarity() {
        let a = vec![1.0, 1.0];
        let b = vec![1.0, 0.0];
        let distance = cosine_distance(&a, &b);
        assert!((distance - (1.0 - std::f32::consts::FRAC_1_SQRT_2)).abs() < 1e-5);
        assert!(cosine_distance(&a, &a).abs() < 1e-6);
    }

    #[test]
    fn test_entry_from_chunk_uses_string_id() {
        let chunk = Chunk {
            chunk_id: 42,
            film: "A New Hope".to_string(),
            scene_id: 7,
            heading: "INT. CANTINA".to_string(),
            chunk_index: 1,
            total_chunks: 3,
            text: "Greedo points his blaster.".to_string(),
        };
        let entry = IndexedEntry::from_chunk(&chunk, vec![0.1, 0.2]);
        assert_eq!(entry.id, "42");
        assert_eq!(entry.metadata.scene_id, 7);
        assert_eq!(entry.metadata.total_chunks, 3);
        assert_eq!(entry.document, chunk.text);
    }

    #[test]
    fn test_dimension_check() {
        let info = CollectionInfo {
            name: "starwars".to_string(),
            embedding_model: "test".to_string(),
            dimensions: 3,
            created_at: Utc::now(),
        };
        assert!(info.check_dimensions(&[0.0, 1.0, 0.0]).is_ok());
        assert!(matches!(
            info.check_dimensions(&[0.0, 1.0]),
            Err(ScreenragError::EmbeddingMismatch(_))
        ));
    }
}

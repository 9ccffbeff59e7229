//! Embedding and indexing of the chunk corpus.
//!
//! A rebuild always starts from an empty collection: an existing collection
//! with the same name is deleted first, so the index reflects exactly one
//! chunk set. A rebuild that fails part way removes the collection instead
//! of leaving it partially filled.

use crate::chunking::Chunk;
use crate::embedding::Embedder;
use crate::error::{Result, ScreenragError};
use crate::vector_store::{IndexedEntry, VectorIndex};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Indexing parameters.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Target collection name.
    pub collection: String,
    /// Chunks embedded per request.
    pub batch_size: usize,
    /// Chunks shorter than this (in characters) are skipped and reported.
    pub min_chunk_length: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            collection: "starwars".to_string(),
            batch_size: 64,
            min_chunk_length: 10,
        }
    }
}

/// A chunk left out of the index for being too short.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilteredChunk {
    pub chunk_id: u64,
    pub film: String,
    pub heading: String,
    pub text: String,
}

/// Outcome of a rebuild.
#[derive(Debug, Clone, Default)]
pub struct IndexReport {
    /// Entries written to the collection.
    pub indexed: usize,
    /// Embedding batches processed.
    pub batches: usize,
    /// Chunks skipped by the length filter.
    pub filtered: Vec<FilteredChunk>,
    /// Whether a previous collection was deleted.
    pub replaced_existing: bool,
}

/// Progress after each batch.
#[derive(Debug, Clone, Copy)]
pub struct BatchProgress {
    pub batch: usize,
    pub total_batches: usize,
    pub indexed: usize,
}

/// One hit of the verification query.
#[derive(Debug, Clone)]
pub struct VerificationHit {
    pub film: String,
    pub heading: String,
    pub similarity: f32,
    pub text: String,
}

/// Result of the post-build diagnostic query.
#[derive(Debug, Clone)]
pub struct Verification {
    pub collection: String,
    pub count: usize,
    pub query: String,
    pub hits: Vec<VerificationHit>,
}

/// Split chunks into those long enough to index and those filtered out.
pub fn partition_by_length(chunks: &[Chunk], min_chunk_length: usize) -> (Vec<&Chunk>, Vec<FilteredChunk>) {
    let mut kept = Vec::with_capacity(chunks.len());
    let mut filtered = Vec::new();

    for chunk in chunks {
        if chunk.char_len() >= min_chunk_length {
            kept.push(chunk);
        } else {
            filtered.push(FilteredChunk {
                chunk_id: chunk.chunk_id,
                film: chunk.film.clone(),
                heading: chunk.heading.clone(),
                text: chunk.text.clone(),
            });
        }
    }

    (kept, filtered)
}

/// Builds a collection from a chunk set.
pub struct Indexer {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    config: IndexerConfig,
}

impl Indexer {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>, config: IndexerConfig) -> Self {
        Self {
            embedder,
            index,
            config,
        }
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Recreate the collection from `chunks`, calling `on_batch` after each batch.
    #[instrument(skip_all, fields(collection = %self.config.collection, chunks = chunks.len()))]
    pub async fn rebuild<F>(&self, chunks: &[Chunk], mut on_batch: F) -> Result<IndexReport>
    where
        F: FnMut(BatchProgress),
    {
        if self.config.batch_size == 0 {
            return Err(ScreenragError::Config("index batch size must be > 0".to_string()));
        }

        let (kept, filtered) = partition_by_length(chunks, self.config.min_chunk_length);
        for chunk in &filtered {
            warn!(
                "Skipping chunk {} ({} | {}): shorter than {} chars: {:?}",
                chunk.chunk_id, chunk.film, chunk.heading, self.config.min_chunk_length, chunk.text
            );
        }

        let replaced_existing = self.index.delete_collection(&self.config.collection).await?;
        if replaced_existing {
            info!("Deleted existing collection '{}'", self.config.collection);
        }
        self.index
            .create_collection(
                &self.config.collection,
                self.embedder.model(),
                self.embedder.dimensions(),
            )
            .await?;

        let total_batches = kept.len().div_ceil(self.config.batch_size);
        let indexed = match self.populate(&kept, total_batches, &mut on_batch).await {
            Ok(indexed) => indexed,
            Err(e) => {
                // A half-filled collection must not be served.
                warn!("Rebuild of '{}' failed, removing partial collection", self.config.collection);
                if let Err(cleanup) = self.index.delete_collection(&self.config.collection).await {
                    warn!("Failed to remove partial collection: {}", cleanup);
                }
                return Err(e);
            }
        };

        info!(
            "Indexed {} chunks in {} batches ({} filtered)",
            indexed,
            total_batches,
            filtered.len()
        );

        Ok(IndexReport {
            indexed,
            batches: total_batches,
            filtered,
            replaced_existing,
        })
    }

    async fn populate<F>(&self, kept: &[&Chunk], total_batches: usize, on_batch: &mut F) -> Result<usize>
    where
        F: FnMut(BatchProgress),
    {
        let mut indexed = 0;

        for (i, batch) in kept.chunks(self.config.batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;
            if embeddings.len() != batch.len() {
                return Err(ScreenragError::Embedding(format!(
                    "batch {}: expected {} embeddings, got {}",
                    i + 1,
                    batch.len(),
                    embeddings.len()
                )));
            }

            let entries: Vec<IndexedEntry> = batch
                .iter()
                .zip(embeddings)
                .map(|(chunk, embedding)| IndexedEntry::from_chunk(chunk, embedding))
                .collect();
            indexed += self.index.add(&self.config.collection, &entries).await?;

            debug!("Indexed batch {}/{}", i + 1, total_batches);
            on_batch(BatchProgress {
                batch: i + 1,
                total_batches,
                indexed,
            });
        }

        Ok(indexed)
    }

    /// Count the collection and run one diagnostic query against it.
    #[instrument(skip(self))]
    pub async fn verify(&self, query: &str, k: usize) -> Result<Verification> {
        let count = self.index.count(&self.config.collection).await?;
        let embedding = self.embedder.embed(query).await?;
        let hits = self
            .index
            .query(&self.config.collection, &embedding, k)
            .await?
            .into_iter()
            .map(|hit| VerificationHit {
                film: hit.metadata.film,
                heading: hit.metadata.heading,
                similarity: 1.0 - hit.distance,
                text: hit.document,
            })
            .collect();

        Ok(Verification {
            collection: self.config.collection.clone(),
            count,
            query: query.to_string(),
            hits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::KeywordEmbedder;
    use crate::vector_store::{MemoryVectorIndex, SqliteVectorIndex};

    fn chunk(chunk_id: u64, text: &str) -> Chunk {
        Chunk {
            chunk_id,
            film: "Return Of The Jedi".to_string(),
            scene_id: (chunk_id / 2) as u32 + 1,
            heading: "EXT. ENDOR - FOREST".to_string(),
            chunk_index: (chunk_id % 2) as u32,
            total_chunks: 2,
            text: text.to_string(),
        }
    }

    fn corpus() -> Vec<Chunk> {
        vec![
            chunk(0, "The ewoks lead the rebels through the forest."),
            chunk(1, "Leia."),
            chunk(2, "Han and Leia reach the bunker door."),
            chunk(3, "Luke surrenders to the Imperial walkers."),
            chunk(4, ""),
            chunk(5, "Vader brings Luke before the Emperor."),
        ]
    }

    fn embedder() -> Arc<KeywordEmbedder> {
        Arc::new(KeywordEmbedder::new(&["ewoks", "leia", "luke", "vader", "forest", "emperor"]))
    }

    fn config(batch_size: usize) -> IndexerConfig {
        IndexerConfig {
            collection: "starwars".to_string(),
            batch_size,
            min_chunk_length: 10,
        }
    }

    #[test]
    fn test_short_chunks_reported() {
        let chunks = corpus();
        let (kept, filtered) = partition_by_length(&chunks, 10);

        assert_eq!(kept.len(), 4);
        let ids: Vec<u64> = filtered.iter().map(|f| f.chunk_id).collect();
        assert_eq!(ids, vec![1, 4]);
        assert_eq!(filtered[0].text, "Leia.");
    }

    #[tokio::test]
    async fn test_rebuild_indexes_survivors_in_batches() {
        let embedder = embedder();
        let index = Arc::new(MemoryVectorIndex::new());
        let indexer = Indexer::new(embedder.clone(), index.clone(), config(3));

        let mut progress = Vec::new();
        let report = indexer
            .rebuild(&corpus(), |p| progress.push((p.batch, p.total_batches, p.indexed)))
            .await
            .unwrap();

        assert_eq!(report.indexed, 4);
        assert_eq!(report.batches, 2);
        assert_eq!(report.filtered.len(), 2);
        assert!(!report.replaced_existing);
        assert_eq!(progress, vec![(1, 2, 3), (2, 2, 4)]);
        assert_eq!(embedder.batch_calls(), 2);
        assert_eq!(index.count("starwars").await.unwrap(), 4);
        assert_eq!(
            index.ids("starwars").await.unwrap(),
            vec!["0".to_string(), "2".to_string(), "3".to_string(), "5".to_string()]
        );
    }

    #[tokio::test]
    async fn test_rebuild_is_idempotent() {
        let index = Arc::new(SqliteVectorIndex::in_memory().unwrap());
        let indexer = Indexer::new(embedder(), index.clone(), config(2));

        let first = indexer.rebuild(&corpus(), |_| {}).await.unwrap();
        let first_ids = index.ids("starwars").await.unwrap();

        let second = indexer.rebuild(&corpus(), |_| {}).await.unwrap();
        let second_ids = index.ids("starwars").await.unwrap();

        assert!(second.replaced_existing);
        assert_eq!(first.indexed, second.indexed);
        assert_eq!(first_ids, second_ids);
        assert_eq!(index.count("starwars").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_rebuild_drops_stale_entries() {
        let index = Arc::new(MemoryVectorIndex::new());
        let indexer = Indexer::new(embedder(), index.clone(), config(64));

        indexer.rebuild(&corpus(), |_| {}).await.unwrap();
        indexer.rebuild(&corpus()[..1], |_| {}).await.unwrap();

        assert_eq!(index.ids("starwars").await.unwrap(), vec!["0".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_rebuild_leaves_no_collection() {
        let embedder = Arc::new(
            KeywordEmbedder::new(&["ewoks", "leia", "luke", "vader", "forest", "emperor"]).failing_on_batch(2),
        );
        let index = Arc::new(MemoryVectorIndex::new());
        let indexer = Indexer::new(embedder.clone(), index.clone(), config(2));

        let result = indexer.rebuild(&corpus(), |_| {}).await;
        assert!(matches!(result, Err(ScreenragError::Embedding(_))));
        assert_eq!(embedder.batch_calls(), 2);
        assert!(index.get_collection("starwars").await.unwrap().is_none());
        assert!(matches!(
            index.count("starwars").await,
            Err(ScreenragError::CollectionMissing(_))
        ));
    }

    #[tokio::test]
    async fn test_verify_reports_hits() {
        let index = Arc::new(MemoryVectorIndex::new());
        let indexer = Indexer::new(embedder(), index, config(64));
        indexer.rebuild(&corpus(), |_| {}).await.unwrap();

        let verification = indexer.verify("vader and the emperor", 3).await.unwrap();
        assert_eq!(verification.count, 4);
        assert_eq!(verification.hits.len(), 3);
        assert_eq!(verification.hits[0].heading, "EXT. ENDOR - FOREST");
        assert!(verification.hits[0].text.starts_with("Vader brings Luke"));
        assert!(verification.hits[0].similarity > verification.hits[2].similarity);
    }

    #[tokio::test]
    async fn test_verify_without_collection_fails() {
        let indexer = Indexer::new(embedder(), Arc::new(MemoryVectorIndex::new()), config(64));
        assert!(matches!(
            indexer.verify("I am your father", 3).await,
            Err(ScreenragError::CollectionMissing(_))
        ));
    }
}

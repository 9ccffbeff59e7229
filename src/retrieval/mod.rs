//! Query-time retrieval: embed the question, look up nearest chunks, keep the
//! ones similar enough to be worth showing to the model.

mod gate;

pub use gate::{Gate, GateDecision, Outcome};

use crate::embedding::Embedder;
use crate::error::{Result, ScreenragError};
use crate::vector_store::{CollectionInfo, QueryHit, VectorIndex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A chunk accepted by the retriever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Index entry id (string form of the chunk id).
    pub id: String,
    pub text: String,
    pub film: String,
    pub scene_id: u32,
    pub heading: String,
    /// `1 - cosine distance`.
    pub similarity: f32,
}

impl From<QueryHit> for RetrievedChunk {
    fn from(hit: QueryHit) -> Self {
        Self {
            id: hit.id,
            text: hit.document,
            film: hit.metadata.film,
            scene_id: hit.metadata.scene_id,
            heading: hit.metadata.heading,
            similarity: 1.0 - hit.distance,
        }
    }
}

/// Chunks accepted for one query, plus what the index offered before thresholding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Retrieval {
    /// Neighbours at or above the threshold, most similar first.
    pub chunks: Vec<RetrievedChunk>,
    /// Highest similarity among all neighbours, `None` when the index returned none.
    pub best_similarity: Option<f32>,
}

impl Retrieval {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Retrieval parameters.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Collection to query.
    pub collection: String,
    /// Neighbours requested from the index.
    pub top_k: usize,
    /// Results below this similarity are discarded.
    pub min_similarity: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            collection: "starwars".to_string(),
            top_k: 5,
            min_similarity: 0.45,
        }
    }
}

/// Embeds queries and performs thresholded nearest-neighbour lookup.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    config: RetrievalConfig,
}

impl Retriever {
    /// Create a new retriever.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            config,
        }
    }

    /// Retrieval parameters in effect.
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Ensure the collection exists and was built in the query embedder's space.
    pub async fn check_collection(&self) -> Result<CollectionInfo> {
        let info = self
            .index
            .get_collection(&self.config.collection)
            .await?
            .ok_or_else(|| ScreenragError::CollectionMissing(self.config.collection.clone()))?;

        if info.embedding_model != self.embedder.model() {
            return Err(ScreenragError::EmbeddingMismatch(format!(
                "collection '{}' was built with '{}', queries use '{}'. Rebuild the index.",
                info.name,
                info.embedding_model,
                self.embedder.model()
            )));
        }
        if info.dimensions != self.embedder.dimensions() {
            return Err(ScreenragError::EmbeddingMismatch(format!(
                "collection '{}' holds {}-dimensional vectors, embedder produces {}",
                info.name,
                info.dimensions,
                self.embedder.dimensions()
            )));
        }

        Ok(info)
    }

    /// Retrieve chunks for `query`, most similar first.
    ///
    /// An empty result is a valid outcome. A missing collection or an embedding
    /// space mismatch is an error.
    #[instrument(skip(self), fields(collection = %self.config.collection, k = self.config.top_k))]
    pub async fn retrieve(&self, query: &str) -> Result<Retrieval> {
        self.check_collection().await?;

        let embedding = self.embedder.embed(query).await?;
        let mut hits = self
            .index
            .query(&self.config.collection, &embedding, self.config.top_k)
            .await?;
        ensure_increasing_distance(&mut hits);

        let candidates = hits.len();
        let best_similarity = hits.first().map(|hit| 1.0 - hit.distance);
        let chunks: Vec<RetrievedChunk> = hits
            .into_iter()
            .map(RetrievedChunk::from)
            .filter(|r| r.similarity >= self.config.min_similarity)
            .collect();

        debug!(
            "Kept {} of {} neighbours at threshold {:.2}",
            chunks.len(),
            candidates,
            self.config.min_similarity
        );
        if let Some(top) = chunks.first() {
            info!("Top match: {} / {} ({:.3})", top.film, top.heading, top.similarity);
        }

        Ok(Retrieval {
            chunks,
            best_similarity,
        })
    }
}

/// Restore increasing-distance order if the index did not deliver it.
fn ensure_increasing_distance(hits: &mut [QueryHit]) {
    let ordered = hits.windows(2).all(|w| w[0].distance <= w[1].distance);
    if !ordered {
        warn!("Index returned neighbours out of distance order, re-sorting");
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::KeywordEmbedder;
    use crate::vector_store::{EntryMetadata, IndexedEntry, MemoryVectorIndex};
    use async_trait::async_trait;

    fn entry(id: &str, text: &str, embedder: &KeywordEmbedder) -> IndexedEntry {
        IndexedEntry {
            id: id.to_string(),
            document: text.to_string(),
            embedding: embedder.vectorize(text),
            metadata: EntryMetadata {
                film: "A New Hope".to_string(),
                scene_id: id.parse().unwrap_or(0),
                heading: format!("INT. SCENE {}", id),
                chunk_index: 0,
                total_chunks: 1,
            },
        }
    }

    async fn setup(min_similarity: f32) -> Retriever {
        let embedder = Arc::new(KeywordEmbedder::new(&["father", "luke", "death", "star", "droid"]));
        let index = Arc::new(MemoryVectorIndex::new());
        index
            .create_collection("starwars", embedder.model(), embedder.dimensions())
            .await
            .unwrap();
        index
            .add(
                "starwars",
                &[
                    entry("1", "Vader tells Luke: I am your father.", &embedder),
                    entry("2", "The Death Star approaches the rebel base.", &embedder),
                    entry("3", "A droid rolls through the desert.", &embedder),
                ],
            )
            .await
            .unwrap();

        Retriever::new(
            embedder,
            index,
            RetrievalConfig {
                collection: "starwars".to_string(),
                top_k: 5,
                min_similarity,
            },
        )
    }

    #[tokio::test]
    async fn test_retrieval_respects_threshold() {
        let retriever = setup(0.45).await;
        let retrieval = retriever.retrieve("luke father").await.unwrap();

        assert!(!retrieval.is_empty());
        assert_eq!(retrieval.chunks[0].id, "1");
        assert!(retrieval.chunks.iter().all(|r| r.similarity >= 0.45));
        assert_eq!(retrieval.best_similarity, Some(retrieval.chunks[0].similarity));
    }

    #[tokio::test]
    async fn test_results_descend_by_similarity() {
        let retriever = setup(-1.0).await;
        let results = retriever.retrieve("death star father").await.unwrap().chunks;

        assert_eq!(results.len(), 3);
        for pair in results.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
    }

    #[tokio::test]
    async fn test_unrelated_query_returns_empty() {
        let retriever = setup(0.45).await;
        let retrieval = retriever.retrieve("what does yoda eat").await.unwrap();
        assert!(retrieval.is_empty());
        assert_eq!(retrieval.best_similarity, Some(0.0));
    }

    #[tokio::test]
    async fn test_best_similarity_kept_when_all_filtered() {
        let retriever = setup(0.9).await;
        let retrieval = retriever.retrieve("luke and the death star").await.unwrap();

        assert!(retrieval.is_empty());
        let best = retrieval.best_similarity.unwrap();
        assert!(best > 0.0 && best < 0.9);
    }

    #[tokio::test]
    async fn test_empty_collection_has_no_candidates() {
        let embedder = Arc::new(KeywordEmbedder::new(&["luke"]));
        let index = Arc::new(MemoryVectorIndex::new());
        index
            .create_collection("starwars", embedder.model(), embedder.dimensions())
            .await
            .unwrap();
        let retriever = Retriever::new(embedder, index, RetrievalConfig::default());

        let retrieval = retriever.retrieve("luke").await.unwrap();
        assert_eq!(retrieval, Retrieval::default());
    }

    #[tokio::test]
    async fn test_missing_collection_is_not_empty_result() {
        let embedder = Arc::new(KeywordEmbedder::new(&["luke"]));
        let retriever = Retriever::new(
            embedder,
            Arc::new(MemoryVectorIndex::new()),
            RetrievalConfig::default(),
        );
        let result = retriever.retrieve("luke").await;
        assert!(matches!(result, Err(ScreenragError::CollectionMissing(_))));
    }

    #[tokio::test]
    async fn test_model_mismatch_detected() {
        let index = Arc::new(MemoryVectorIndex::new());
        index
            .create_collection("starwars", "some-other-model", 2)
            .await
            .unwrap();
        let retriever = Retriever::new(
            Arc::new(KeywordEmbedder::new(&["luke", "leia"])),
            index,
            RetrievalConfig::default(),
        );
        let result = retriever.retrieve("luke").await;
        assert!(matches!(result, Err(ScreenragError::EmbeddingMismatch(_))));
    }

    struct ReversedIndex(MemoryVectorIndex);

    #[async_trait]
    impl VectorIndex for ReversedIndex {
        async fn get_collection(&self, name: &str) -> Result<Option<CollectionInfo>> {
            self.0.get_collection(name).await
        }
        async fn create_collection(&self, name: &str, model: &str, dims: usize) -> Result<CollectionInfo> {
            self.0.create_collection(name, model, dims).await
        }
        async fn delete_collection(&self, name: &str) -> Result<bool> {
            self.0.delete_collection(name).await
        }
        async fn add(&self, collection: &str, entries: &[IndexedEntry]) -> Result<usize> {
            self.0.add(collection, entries).await
        }
        async fn query(&self, collection: &str, embedding: &[f32], k: usize) -> Result<Vec<QueryHit>> {
            let mut hits = self.0.query(collection, embedding, k).await?;
            hits.reverse();
            Ok(hits)
        }
        async fn count(&self, collection: &str) -> Result<usize> {
            self.0.count(collection).await
        }
        async fn ids(&self, collection: &str) -> Result<Vec<String>> {
            self.0.ids(collection).await
        }
    }

    #[tokio::test]
    async fn test_out_of_order_index_is_resorted() {
        let embedder = Arc::new(KeywordEmbedder::new(&["luke", "leia", "han"]));
        let inner = MemoryVectorIndex::new();
        inner
            .create_collection("starwars", embedder.model(), embedder.dimensions())
            .await
            .unwrap();
        inner
            .add(
                "starwars",
                &[
                    entry("1", "luke", &embedder),
                    entry("2", "luke leia", &embedder),
                    entry("3", "luke leia han", &embedder),
                ],
            )
            .await
            .unwrap();

        let retriever = Retriever::new(
            embedder,
            Arc::new(ReversedIndex(inner)),
            RetrievalConfig {
                min_similarity: -1.0,
                ..RetrievalConfig::default()
            },
        );
        let results = retriever.retrieve("luke").await.unwrap().chunks;
        assert_eq!(results[0].id, "1");
        for pair in results.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
    }
}

//! Pipeline orchestrator for Screenrag.
//!
//! Wires the components from [`Settings`] and runs the offline stages
//! (ingest, chunk, index) as well as the per-query path
//! (retrieve, gate, answer, log).

use crate::answer::{Answerer, Generator, OpenAIGenerator, StreamEnd};
use crate::chunking::{chunk_scenes, Chunk, ChunkStats, ChunkingConfig, RecursiveSplitter};
use crate::config::{Prompts, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{Result, ScreenragError};
use crate::indexer::{BatchProgress, IndexReport, Indexer, IndexerConfig, Verification};
use crate::ingest::{ingest_corpus, read_artifact, write_artifact, IngestResult, ScriptCleaner};
use crate::query_log::{LogEntry, QueryLog};
use crate::retrieval::{Gate, Outcome, RetrievalConfig, RetrievedChunk, Retriever};
use crate::segmentation::{HeaderSegmenter, Scene};
use crate::vector_store::{SqliteVectorIndex, VectorIndex};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument};

/// Result of the chunking stage.
#[derive(Debug, Clone)]
pub struct ChunkResult {
    pub chunks: Vec<Chunk>,
    pub stats: ChunkStats,
    /// Scenes read from the scene artifact.
    pub scenes: usize,
}

/// What happened to one question.
#[derive(Debug, Clone)]
pub struct QueryReport {
    pub outcome: Outcome,
    pub top_similarity: Option<f32>,
    /// Chunks that passed retrieval, most similar first.
    pub sources: Vec<RetrievedChunk>,
    /// Generated text, partial when aborted.
    pub answer: Option<String>,
    /// Refusal shown to the user when the gate rejected.
    pub refusal: Option<String>,
}

/// The main orchestrator for the Screenrag pipeline.
pub struct Orchestrator {
    settings: Settings,
    prompts: Prompts,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    index: Arc<dyn VectorIndex>,
    query_log: QueryLog,
    /// Rebuild holds the write half, retrieval a read half.
    index_lock: RwLock<()>,
}

impl Orchestrator {
    /// Create an orchestrator with OpenAI-compatible services and the SQLite index.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::with_config(
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
            settings.embedding.api_base.as_deref(),
        )?);

        let generator: Arc<dyn Generator> = Arc::new(
            OpenAIGenerator::new(
                &settings.generation.model,
                settings.generation.endpoint(),
            )?
            .with_temperature(settings.generation.temperature),
        );

        let index: Arc<dyn VectorIndex> = Arc::new(SqliteVectorIndex::new(&settings.sqlite_path())?);
        let query_log = QueryLog::new(settings.query_log_path());

        info!(
            "Using embedding model {} and generation model {}",
            settings.embedding.model, settings.generation.model
        );

        Ok(Self::with_components(
            settings, prompts, embedder, generator, index, query_log,
        ))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        index: Arc<dyn VectorIndex>,
        query_log: QueryLog,
    ) -> Self {
        Self {
            settings,
            prompts,
            embedder,
            generator,
            index,
            query_log,
            index_lock: RwLock::new(()),
        }
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get the query log.
    pub fn query_log(&self) -> &QueryLog {
        &self.query_log
    }

    /// Get a reference to the vector index.
    pub fn index(&self) -> Arc<dyn VectorIndex> {
        self.index.clone()
    }

    fn indexer(&self) -> Indexer {
        Indexer::new(
            self.embedder.clone(),
            self.index.clone(),
            IndexerConfig {
                collection: self.settings.index.collection.clone(),
                batch_size: self.settings.index.batch_size,
                min_chunk_length: self.settings.index.min_chunk_length,
            },
        )
    }

    fn retriever(&self) -> Retriever {
        Retriever::new(
            self.embedder.clone(),
            self.index.clone(),
            RetrievalConfig {
                collection: self.settings.index.collection.clone(),
                top_k: self.settings.retrieval.top_k,
                min_similarity: self.settings.retrieval.min_similarity,
            },
        )
    }

    fn gate(&self) -> Gate {
        Gate::new(
            self.settings.retrieval.min_similarity,
            self.prompts.rag.refusal.clone(),
        )
    }

    /// Clean and segment the corpus, writing the scene artifact.
    #[instrument(skip(self))]
    pub fn ingest(&self) -> Result<IngestResult> {
        let cleaner = ScriptCleaner::new()?;
        let segmenter = HeaderSegmenter::new(self.settings.corpus.min_scene_length)?;

        let result = ingest_corpus(&self.settings.scripts_dir(), &cleaner, &segmenter)?;
        write_artifact(&self.settings.scenes_path(), &result.scenes)?;

        info!("Ingested {} films into {} scenes", result.films.len(), result.scenes.len());
        Ok(result)
    }

    /// Chunk the scene artifact, writing the chunk artifact.
    #[instrument(skip(self))]
    pub fn chunk(&self) -> Result<ChunkResult> {
        let scenes: Vec<Scene> = read_artifact(&self.settings.scenes_path())?;
        let splitter = RecursiveSplitter::new(&ChunkingConfig {
            chunk_size: self.settings.chunking.chunk_size,
            chunk_overlap: self.settings.chunking.chunk_overlap,
        })?;

        let chunks = chunk_scenes(&scenes, &splitter);
        write_artifact(&self.settings.chunks_path(), &chunks)?;

        let stats = ChunkStats::from_chunks(&chunks);
        info!("Chunked {} scenes into {} chunks", scenes.len(), chunks.len());
        Ok(ChunkResult {
            chunks,
            stats,
            scenes: scenes.len(),
        })
    }

    /// Rebuild the collection from the chunk artifact.
    pub async fn rebuild_index<F>(&self, on_batch: F) -> Result<IndexReport>
    where
        F: FnMut(BatchProgress),
    {
        let chunks: Vec<Chunk> = read_artifact(&self.settings.chunks_path())?;
        self.rebuild_from_chunks(&chunks, on_batch).await
    }

    /// Rebuild the collection from an in-memory chunk set.
    pub async fn rebuild_from_chunks<F>(&self, chunks: &[Chunk], on_batch: F) -> Result<IndexReport>
    where
        F: FnMut(BatchProgress),
    {
        let _guard = self.index_lock.write().await;
        self.indexer().rebuild(chunks, on_batch).await
    }

    /// Count the collection and run the configured verification query.
    pub async fn verify(&self) -> Result<Verification> {
        let _guard = self.index_lock.read().await;
        self.indexer()
            .verify(&self.settings.index.verify_query, self.settings.index.verify_k)
            .await
    }

    /// Retrieve chunks above the similarity threshold, without gating or generation.
    pub async fn search(&self, query: &str) -> Result<Vec<RetrievedChunk>> {
        let query = validate_question(query)?;
        let _guard = self.index_lock.read().await;
        Ok(self.retriever().retrieve(query).await?.chunks)
    }

    /// Answer one question, writing exactly one query log entry once an
    /// outcome is known.
    ///
    /// Tokens are passed to `on_token` as they arrive. Resolving `cancel`
    /// abandons generation; the partial answer is logged as `aborted`. A
    /// generation failure is logged the same way and then returned as an error.
    #[instrument(skip(self, cancel, on_token))]
    pub async fn ask<C, F>(&self, question: &str, cancel: C, on_token: F) -> Result<QueryReport>
    where
        C: Future<Output = ()>,
        F: FnMut(&str),
    {
        let question = validate_question(question)?;

        let retrieval = {
            let _guard = self.index_lock.read().await;
            self.retriever().retrieve(question).await?
        };

        let gate = self.gate();
        let decision = gate.evaluate(&retrieval);
        let results = retrieval.chunks;

        if !decision.sufficient {
            info!("Gate rejected query: {}", decision.outcome);
            self.query_log.append(&LogEntry::new(
                question,
                decision.outcome,
                decision.top_similarity,
                &results,
                None,
            ))?;
            return Ok(QueryReport {
                outcome: decision.outcome,
                top_similarity: decision.top_similarity,
                sources: results,
                answer: None,
                refusal: Some(gate.refusal().to_string()),
            });
        }

        let answerer = Answerer::new(self.generator.clone(), self.prompts.clone());
        let answer = answerer.answer(question, &results, cancel, on_token).await;

        let (outcome, text, failure) = match answer.end {
            StreamEnd::Completed => (Outcome::Answered, Some(answer.text), None),
            StreamEnd::Cancelled => (Outcome::Aborted, non_empty(answer.text), None),
            StreamEnd::Failed(e) => (Outcome::Aborted, non_empty(answer.text), Some(e)),
        };

        self.query_log.append(&LogEntry::new(
            question,
            outcome,
            decision.top_similarity,
            &results,
            text.clone(),
        ))?;

        if let Some(e) = failure {
            return Err(e);
        }

        Ok(QueryReport {
            outcome,
            top_similarity: decision.top_similarity,
            sources: results,
            answer: text,
            refusal: None,
        })
    }
}

fn validate_question(question: &str) -> Result<&str> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(ScreenragError::InvalidInput("question is empty".to_string()));
    }
    Ok(trimmed)
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

//! Screenrag - Question answering over screenplays
//!
//! A retrieval-augmented pipeline that answers questions strictly from the
//! text of a small screenplay corpus, and refuses when retrieval finds
//! nothing relevant enough.
//!
//! # Overview
//!
//! The pipeline runs in stages, each persisting its output:
//! - Screenplays are cleaned and segmented into scenes at slug lines
//! - Scenes are split into overlapping chunks
//! - Chunks are embedded and stored in a cosine vector index
//! - Questions retrieve the nearest chunks, pass a relevance gate, and are
//!   answered by a chat model grounded on those chunks
//! - Every question is appended to a JSONL audit log
//!
//! # Architecture
//!
//! - `config` - Settings and prompt templates
//! - `segmentation` - Scene heading detection and splitting
//! - `ingest` - Corpus discovery, cleaning, scene artifacts
//! - `chunking` - Recursive chunking of scenes
//! - `embedding` - Embedding providers
//! - `vector_store` - Vector index abstraction (SQLite, in-memory)
//! - `indexer` - Index rebuild and verification
//! - `retrieval` - Nearest-chunk retrieval and the relevance gate
//! - `answer` - Grounded, streamed answer generation
//! - `query_log` - JSONL query audit log
//! - `orchestrator` - Pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use screenrag::config::Settings;
//! use screenrag::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     let report = orchestrator
//!         .ask("Who is Luke's father?", std::future::pending::<()>(), |token| print!("{}", token))
//!         .await?;
//!     println!("\n{}", report.outcome);
//!
//!     Ok(())
//! }
//! ```

pub mod answer;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod indexer;
pub mod ingest;
pub mod openai;
pub mod orchestrator;
pub mod query_log;
pub mod retrieval;
pub mod segmentation;
pub mod vector_store;

#[cfg(test)]
mod testing;

pub use error::{Result, ScreenragError};

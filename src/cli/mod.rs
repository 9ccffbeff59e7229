//! CLI module for Screenrag.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Screenrag - Question answering over screenplays
///
/// Splits screenplays into scenes and chunks, indexes them by embedding, and
/// answers questions strictly from retrieved passages, refusing when the
/// evidence is too weak. Every question is recorded in a JSONL audit log.
#[derive(Parser, Debug)]
#[command(name = "screenrag")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "SCREENRAG_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Clean and segment the screenplays into scenes
    Ingest,

    /// Split scenes into overlapping chunks
    Chunk,

    /// Embed the chunks and rebuild the index
    Index {
        /// Skip the verification query after indexing
        #[arg(long)]
        no_verify: bool,
    },

    /// Run ingest, chunk and index in sequence
    Build {
        /// Skip the verification query after indexing
        #[arg(long)]
        no_verify: bool,
    },

    /// Ask a single question
    Ask {
        /// The question to ask
        question: String,
    },

    /// Start an interactive question loop
    Chat,

    /// Show the chunks retrieved for a query, without generating an answer
    Search {
        /// Search query
        query: String,

        /// Number of neighbours to look up (defaults to retrieval.top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Minimum similarity (defaults to retrieval.min_similarity)
        #[arg(short, long)]
        min_similarity: Option<f32>,
    },

    /// Show chunk length statistics
    Stats,

    /// Summarize the query log
    Log {
        /// Also print the last N entries
        #[arg(short = 'n', long)]
        tail: Option<usize>,
    },

    /// Check configuration, corpus, artifacts and index
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

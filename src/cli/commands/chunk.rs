//! Chunk and stats command implementations.

use crate::chunking::{Chunk, ChunkStats};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::ingest::read_artifact;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the chunk command.
pub fn run_chunk(settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Chunk, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;
    chunk_stage(&orchestrator)
}

/// Chunk the scene artifact and print statistics.
pub(super) fn chunk_stage(orchestrator: &Orchestrator) -> Result<()> {
    let settings = orchestrator.settings();
    Output::header("Chunking scenes");
    Output::kv(
        "Window",
        &format!(
            "{} chars, {} overlap",
            settings.chunking.chunk_size, settings.chunking.chunk_overlap
        ),
    );

    let result = orchestrator.chunk()?;
    print_stats(&result.stats);

    Output::success(&format!(
        "{} chunks from {} scenes written to {}",
        result.chunks.len(),
        result.scenes,
        settings.chunks_path().display()
    ));
    Ok(())
}

/// Run the stats command.
pub fn run_stats(settings: Settings) -> Result<()> {
    let chunks: Vec<Chunk> = match read_artifact(&settings.chunks_path()) {
        Ok(chunks) => chunks,
        Err(e) => {
            Output::error(&format!("{}", e));
            Output::info("Run 'screenrag chunk' first.");
            return Err(e.into());
        }
    };

    Output::header("Chunk statistics");
    print_stats(&ChunkStats::from_chunks(&chunks));
    Ok(())
}

fn print_stats(stats: &ChunkStats) {
    Output::kv("Total chunks", &stats.total.to_string());
    Output::kv(
        "Length",
        &format!(
            "avg {} / min {} / max {} chars",
            stats.avg_len, stats.min_len, stats.max_len
        ),
    );
    for (film, film_stats) in &stats.by_film {
        Output::list_item(&format!(
            "{}: {} chunks, avg {} chars",
            film, film_stats.chunks, film_stats.avg_len
        ));
    }
}

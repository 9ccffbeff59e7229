//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(
    query: &str,
    top_k: Option<usize>,
    min_similarity: Option<f32>,
    mut settings: Settings,
) -> Result<()> {
    if let Some(k) = top_k {
        settings.retrieval.top_k = k;
    }
    if let Some(threshold) = min_similarity {
        settings.retrieval.min_similarity = threshold;
    }
    settings.validate()?;

    if let Err(e) = preflight::check(Operation::Search, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let threshold = settings.retrieval.min_similarity;
    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Searching...");
    let results = orchestrator.search(query).await;
    spinner.finish_and_clear();

    match results {
        Ok(chunks) => {
            if chunks.is_empty() {
                Output::warning(&format!(
                    "No chunks at or above similarity {:.2}.",
                    threshold
                ));
            } else {
                Output::success(&format!("Found {} chunks", chunks.len()));
                for (i, chunk) in chunks.iter().enumerate() {
                    Output::source(i + 1, &chunk.film, &chunk.heading, chunk.similarity, &chunk.text);
                }
                println!();
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}

//! Index and build command implementations.

use super::chunk::chunk_stage;
use super::ingest::ingest_stage;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the index command.
pub async fn run_index(no_verify: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Index, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'screenrag doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;
    index_stage(&orchestrator, no_verify).await
}

/// Run the build command: ingest, chunk and index.
pub async fn run_build(no_verify: bool, settings: Settings) -> Result<()> {
    for operation in [Operation::Ingest, Operation::Search] {
        if let Err(e) = preflight::check(operation, &settings) {
            Output::error(&format!("{}", e));
            Output::info("Run 'screenrag doctor' for detailed diagnostics.");
            return Err(e.into());
        }
    }

    let orchestrator = Orchestrator::new(settings)?;
    ingest_stage(&orchestrator)?;
    chunk_stage(&orchestrator)?;
    index_stage(&orchestrator, no_verify).await
}

/// Rebuild the collection from the chunk artifact.
async fn index_stage(orchestrator: &Orchestrator, no_verify: bool) -> Result<()> {
    let settings = orchestrator.settings();
    Output::header("Embedding & indexing");
    Output::kv("Model", &settings.embedding.model);
    Output::kv("Collection", &settings.index.collection);

    let pb = Output::progress_bar(0, "batches");
    let report = orchestrator
        .rebuild_index(|progress| {
            pb.set_length(progress.total_batches as u64);
            pb.set_position(progress.batch as u64);
        })
        .await;
    pb.finish_and_clear();
    let report = report?;

    if report.replaced_existing {
        Output::info(&format!(
            "Replaced existing '{}' collection",
            settings.index.collection
        ));
    }

    if !report.filtered.is_empty() {
        Output::warning(&format!(
            "Filtered out {} chunks shorter than {} chars:",
            report.filtered.len(),
            settings.index.min_chunk_length
        ));
        for chunk in &report.filtered {
            Output::list_item(&format!(
                "chunk_id {} | {} | {} | {:?}",
                chunk.chunk_id, chunk.film, chunk.heading, chunk.text
            ));
        }
    }

    Output::success(&format!(
        "Indexed {} chunks in {} batches",
        report.indexed, report.batches
    ));

    if !no_verify {
        let verification = orchestrator.verify().await?;
        Output::header("Verification");
        Output::kv(
            "Collection",
            &format!(
                "'{}' contains {} indexed chunks",
                verification.collection, verification.count
            ),
        );
        Output::kv("Query", &format!("{:?}", verification.query));

        if verification.hits.is_empty() {
            Output::warning("The verification query returned no results.");
        }
        for (i, hit) in verification.hits.iter().enumerate() {
            Output::source(i + 1, &hit.film, &hit.heading, hit.similarity, &hit.text);
        }
        println!();
    }

    Ok(())
}

//! Ingest command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the ingest command.
pub fn run_ingest(settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ingest, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Put one .txt screenplay per film into the scripts directory.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;
    ingest_stage(&orchestrator)
}

/// Clean and segment the corpus, printing a per-film report.
pub(super) fn ingest_stage(orchestrator: &Orchestrator) -> Result<()> {
    let settings = orchestrator.settings();
    Output::header("Ingesting screenplays");
    Output::kv("Source", &settings.scripts_dir().display().to_string());

    let result = orchestrator.ingest()?;

    for film in &result.films {
        Output::list_item(&format!(
            "{}: {} -> {} chars, {} scenes",
            film.film, film.raw_chars, film.cleaned_chars, film.scenes
        ));
        if film.dropped_scenes > 0 {
            Output::kv(
                "Dropped",
                &format!(
                    "{} scenes shorter than {} chars",
                    film.dropped_scenes, settings.corpus.min_scene_length
                ),
            );
        }
        if film.fallback {
            Output::warning(&format!(
                "No scene headers found in {}; indexed as a single FULL SCRIPT scene.",
                film.path.display()
            ));
        }
    }

    Output::success(&format!(
        "{} scenes from {} films written to {}",
        result.scenes.len(),
        result.films.len(),
        settings.scenes_path().display()
    ));
    Ok(())
}

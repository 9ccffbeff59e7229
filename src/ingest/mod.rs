//! Corpus ingestion: screenplay discovery, cleaning and scene extraction.
//!
//! The corpus is a directory of plain-text files, one per film. Each file is
//! cleaned and handed to a [`Segmenter`]; the resulting scenes are the first
//! pipeline artifact.

mod artifact;
mod clean;

pub use artifact::{read_artifact, write_artifact};
pub use clean::ScriptCleaner;

use crate::error::{Result, ScreenragError};
use crate::segmentation::{Scene, Segmenter};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Per-film ingestion summary.
#[derive(Debug, Clone)]
pub struct FilmReport {
    /// File the film was read from.
    pub path: PathBuf,
    /// Derived film title.
    pub film: String,
    /// Raw size in characters.
    pub raw_chars: usize,
    /// Size after cleaning in characters.
    pub cleaned_chars: usize,
    /// Scenes kept.
    pub scenes: usize,
    /// Scenes dropped for being too short.
    pub dropped_scenes: usize,
    /// True if no scene headers were found.
    pub fallback: bool,
}

/// Result of ingesting the whole corpus.
#[derive(Debug, Clone, Default)]
pub struct IngestResult {
    /// All scenes, films in file-name order, scenes in header order.
    pub scenes: Vec<Scene>,
    /// One report per film.
    pub films: Vec<FilmReport>,
}

/// Derive a human-readable film title from a file name.
///
/// `a_new_hope.txt` and `a-new-hope.txt` both become `A New Hope`.
pub fn film_title(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    stem.split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// List the `.txt` screenplays in a directory, sorted by file name.
pub fn discover_scripts(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ScreenragError::NoSourceFiles(dir.display().to_string()));
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(ScreenragError::NoSourceFiles(dir.display().to_string()));
    }

    Ok(files)
}

/// Ingest every screenplay in `dir` into scenes.
#[instrument(skip_all, fields(dir = %dir.display()))]
pub fn ingest_corpus(
    dir: &Path,
    cleaner: &ScriptCleaner,
    segmenter: &dyn Segmenter,
) -> Result<IngestResult> {
    let files = discover_scripts(dir)?;
    let mut result = IngestResult::default();

    for path in files {
        let film = film_title(&path);
        let bytes = std::fs::read(&path)?;
        let raw = String::from_utf8_lossy(&bytes);
        let cleaned = cleaner.clean(&raw);

        let segmentation = segmenter.segment(&cleaned, &film);
        info!(
            "Ingested '{}': {} scenes ({} dropped{})",
            film,
            segmentation.scenes.len(),
            segmentation.dropped,
            if segmentation.fallback { ", no headers" } else { "" }
        );

        result.films.push(FilmReport {
            path: path.clone(),
            film,
            raw_chars: raw.chars().count(),
            cleaned_chars: cleaned.chars().count(),
            scenes: segmentation.scenes.len(),
            dropped_scenes: segmentation.dropped,
            fallback: segmentation.fallback,
        });
        result.scenes.extend(segmentation.scenes);
    }

    Ok(result)
}

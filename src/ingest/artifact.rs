//! JSON artifacts passed between pipeline stages.
//!
//! Each stage writes its whole output as one pretty-printed JSON array, and the
//! next stage reads it back wholesale. Writes go through a temporary file in the
//! target directory and are renamed into place, so a reader never sees a
//! half-written artifact.

use crate::error::{Result, ScreenragError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::{debug, instrument};

/// Write a stage artifact atomically.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn write_artifact<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, items)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| ScreenragError::Io(e.error))?;

    debug!("Wrote {} items", items.len());
    Ok(())
}

/// Read a stage artifact written by [`write_artifact`].
#[instrument(skip_all, fields(path = %path.display()))]
pub fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Err(ScreenragError::InvalidInput(format!(
            "Artifact {} not found. Run the previous pipeline stage first.",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    let items: Vec<T> = serde_json::from_str(&content)?;
    debug!("Read {} items", items.len());
    Ok(items)
}

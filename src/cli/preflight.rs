//! Pre-flight checks before expensive operations.
//!
//! Validates that inputs and service configuration are in place before
//! starting operations that would otherwise fail midway.

use crate::config::Settings;
use crate::error::{Result, ScreenragError};
use crate::ingest::discover_scripts;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Ingestion requires screenplay files.
    Ingest,
    /// Chunking requires the scene artifact.
    Chunk,
    /// Indexing requires the chunk artifact and an embedding endpoint.
    Index,
    /// Search requires an embedding endpoint.
    Search,
    /// Asking requires embedding and generation endpoints.
    Ask,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Ingest => {
            discover_scripts(&settings.scripts_dir())?;
        }
        Operation::Chunk => {
            check_artifact(&settings.scenes_path(), "ingest")?;
        }
        Operation::Index => {
            check_artifact(&settings.chunks_path(), "chunk")?;
            check_endpoint("embedding", settings.embedding.api_base.as_deref())?;
        }
        Operation::Search => {
            check_endpoint("embedding", settings.embedding.api_base.as_deref())?;
        }
        Operation::Ask => {
            check_endpoint("embedding", settings.embedding.api_base.as_deref())?;
            check_endpoint("generation", settings.generation.endpoint())?;
        }
    }
    Ok(())
}

fn check_artifact(path: &std::path::Path, producer: &str) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(ScreenragError::InvalidInput(format!(
            "{} not found. Run 'screenrag {}' first.",
            path.display(),
            producer
        )))
    }
}

/// A custom API base (e.g. a local Ollama) needs no key; the public API does.
fn check_endpoint(service: &str, api_base: Option<&str>) -> Result<()> {
    if api_base.is_some() {
        return Ok(());
    }
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(()),
        _ => Err(ScreenragError::Config(format!(
            "OPENAI_API_KEY not set and no {service}.api_base configured. \
             Set the key or point {service}.api_base at a local server."
        ))),
    }
}

//! Error types for Screenrag.

use thiserror::Error;

/// Library-level error type for Screenrag operations.
#[derive(Error, Debug)]
pub enum ScreenragError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No .txt screenplay files found in '{0}'")]
    NoSourceFiles(String),

    #[error("Chunking error: {0}")]
    Chunking(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Collection '{0}' does not exist. Run 'screenrag index' first.")]
    CollectionMissing(String),

    #[error("Embedding mismatch: {0}")]
    EmbeddingMismatch(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Query log error: {0}")]
    QueryLog(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pattern error: {0}")]
    Regex(#[from] regex::Error),
}

/// Result type alias for Screenrag operations.
pub type Result<T> = std::result::Result<T, ScreenragError>;

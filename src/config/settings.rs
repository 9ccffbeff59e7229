//! Configuration settings for Screenrag.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub corpus: CorpusSettings,
    pub chunking: ChunkingSettings,
    pub embedding: EmbeddingSettings,
    pub index: IndexSettings,
    pub retrieval: RetrievalSettings,
    pub generation: GenerationSettings,
    pub query_log: QueryLogSettings,
    pub prompts: PromptSettings,
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for intermediate artifacts, the index and the query log.
    pub data_dir: String,
    /// Diagnostic log level without `-v` (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Screenplay corpus settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusSettings {
    /// Directory holding one plain-text screenplay per film.
    pub scripts_dir: String,
    /// Scene artifact file name (inside the data directory).
    pub scenes_file: String,
    /// Chunk artifact file name (inside the data directory).
    pub chunks_file: String,
    /// Scenes shorter than this many characters are dropped as artifacts.
    pub min_scene_length: usize,
}

impl Default for CorpusSettings {
    fn default() -> Self {
        Self {
            scripts_dir: "scripts".to_string(),
            scenes_file: "01_cleaned_docs.json".to_string(),
            chunks_file: "02_chunks.json".to_string(),
            min_scene_length: 30,
        }
    }
}

/// Chunking settings, measured in characters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Target maximum chunk length.
    pub chunk_size: usize,
    /// Characters shared between adjacent chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model to use. Index and query must use the same model.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
    /// OpenAI-compatible API base URL (None = api.openai.com).
    pub api_base: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            api_base: None,
        }
    }
}

/// Vector index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Path to the SQLite index (relative paths resolve against the data directory).
    pub sqlite_path: String,
    /// Collection name.
    pub collection: String,
    /// Chunks embedded and written per batch.
    pub batch_size: usize,
    /// Chunks shorter than this many characters are filtered out and reported.
    pub min_chunk_length: usize,
    /// Verification query run after a rebuild.
    pub verify_query: String,
    /// Results requested by the verification query.
    pub verify_k: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            sqlite_path: "chroma_db/index.db".to_string(),
            collection: "starwars".to_string(),
            batch_size: 64,
            min_chunk_length: 10,
            verify_query: "I am your father".to_string(),
            verify_k: 3,
        }
    }
}

/// Retrieval and gating settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Number of nearest neighbours requested.
    pub top_k: usize,
    /// Minimum cosine similarity for a chunk to be kept and for generation to proceed.
    pub min_similarity: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_similarity: 0.45,
        }
    }
}

/// Answer generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Chat model for answer generation.
    pub model: String,
    /// OpenAI-compatible API base URL (default: local Ollama, empty = api.openai.com).
    pub api_base: Option<String>,
    /// Sampling temperature (None = server default).
    pub temperature: Option<f32>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "llama3.2".to_string(),
            api_base: Some("http://localhost:11434/v1".to_string()),
            temperature: None,
        }
    }
}

impl GenerationSettings {
    /// Configured API base, `None` for the public OpenAI API.
    pub fn endpoint(&self) -> Option<&str> {
        self.api_base.as_deref().filter(|base| !base.trim().is_empty())
    }
}

/// Audit log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryLogSettings {
    /// JSONL log path (relative paths resolve against the data directory).
    pub path: String,
}

impl Default for QueryLogSettings {
    fn default() -> Self {
        Self {
            path: "query_log.jsonl".to_string(),
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let settings: Settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Reject combinations no component can work with.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::ScreenragError;

        if !LOG_LEVELS.contains(&self.general.log_level.as_str()) {
            return Err(ScreenragError::Config(format!(
                "general.log_level '{}' must be one of {}",
                self.general.log_level,
                LOG_LEVELS.join(", ")
            )));
        }
        if self.chunking.chunk_size == 0 {
            return Err(ScreenragError::Config("chunking.chunk_size must be > 0".to_string()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(ScreenragError::Config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.index.batch_size == 0 {
            return Err(ScreenragError::Config("index.batch_size must be > 0".to_string()));
        }
        if self.retrieval.top_k == 0 {
            return Err(ScreenragError::Config("retrieval.top_k must be > 0".to_string()));
        }
        if !(-1.0..=1.0).contains(&self.retrieval.min_similarity) {
            return Err(ScreenragError::Config(format!(
                "retrieval.min_similarity ({}) must lie in [-1, 1]",
                self.retrieval.min_similarity
            )));
        }
        Ok(())
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::ScreenragError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("screenrag")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Resolve a path against the data directory unless it is absolute.
    fn in_data_dir(&self, path: &str) -> PathBuf {
        let expanded = Self::expand_path(path);
        if expanded.is_absolute() {
            expanded
        } else {
            self.data_dir().join(expanded)
        }
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded screenplay directory path.
    pub fn scripts_dir(&self) -> PathBuf {
        Self::expand_path(&self.corpus.scripts_dir)
    }

    /// Path of the scene artifact.
    pub fn scenes_path(&self) -> PathBuf {
        self.in_data_dir(&self.corpus.scenes_file)
    }

    /// Path of the chunk artifact.
    pub fn chunks_path(&self) -> PathBuf {
        self.in_data_dir(&self.corpus.chunks_file)
    }

    /// Get the expanded SQLite index path.
    pub fn sqlite_path(&self) -> PathBuf {
        self.in_data_dir(&self.index.sqlite_path)
    }

    /// Get the expanded query log path.
    pub fn query_log_path(&self) -> PathBuf {
        self.in_data_dir(&self.query_log.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_pipeline_constants() {
        let settings = Settings::default();
        assert_eq!(settings.chunking.chunk_size, 500);
        assert_eq!(settings.chunking.chunk_overlap, 100);
        assert_eq!(settings.index.batch_size, 64);
        assert_eq!(settings.index.min_chunk_length, 10);
        assert_eq!(settings.retrieval.top_k, 5);
        assert!((settings.retrieval.min_similarity - 0.45).abs() < f32::EPSILON);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [retrieval]
            min_similarity = 0.6

            [index]
            collection = "trilogy"
            "#,
        )
        .unwrap();

        assert!((settings.retrieval.min_similarity - 0.6).abs() < f32::EPSILON);
        assert_eq!(settings.retrieval.top_k, 5);
        assert_eq!(settings.index.collection, "trilogy");
        assert_eq!(settings.index.batch_size, 64);
    }

    #[test]
    fn test_generation_defaults_to_local_ollama() {
        let settings = Settings::default();
        assert_eq!(settings.generation.model, "llama3.2");
        assert_eq!(
            settings.generation.api_base.as_deref(),
            Some("http://localhost:11434/v1")
        );
        assert_eq!(settings.embedding.api_base, None);
    }

    #[test]
    fn test_empty_generation_api_base_means_openai() {
        let settings: Settings = toml::from_str(
            r#"
            [generation]
            model = "gpt-4o-mini"
            api_base = ""
            "#,
        )
        .unwrap();
        assert_eq!(settings.generation.endpoint(), None);
        assert_eq!(
            Settings::default().generation.endpoint(),
            Some("http://localhost:11434/v1")
        );
    }

    #[test]
    fn test_log_level_validated() {
        let mut settings = Settings::default();
        assert_eq!(settings.general.log_level, "warn");

        settings.general.log_level = "debug".to_string();
        assert!(settings.validate().is_ok());

        settings.general.log_level = "loud".to_string();
        assert!(matches!(settings.validate(), Err(crate::error::ScreenragError::Config(_))));
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let mut settings = Settings::default();
        settings.chunking.chunk_overlap = 500;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_relative_paths_resolve_in_data_dir() {
        let mut settings = Settings::default();
        settings.general.data_dir = "/srv/screenrag".to_string();
        assert_eq!(
            settings.query_log_path(),
            PathBuf::from("/srv/screenrag/query_log.jsonl")
        );

        settings.query_log.path = "/var/log/queries.jsonl".to_string();
        assert_eq!(settings.query_log_path(), PathBuf::from("/var/log/queries.jsonl"));
    }
}

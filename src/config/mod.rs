//! Configuration module for Screenrag.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{Prompts, RagPrompts};
pub use settings::{
    ChunkingSettings, CorpusSettings, EmbeddingSettings, GeneralSettings, GenerationSettings,
    IndexSettings, PromptSettings, QueryLogSettings, RetrievalSettings, Settings,
};

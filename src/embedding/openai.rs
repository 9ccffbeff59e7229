//! OpenAI-compatible embeddings implementation.

use super::Embedder;
use crate::error::{Result, ScreenragError};
use crate::openai::create_client;
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Maximum inputs per embeddings request.
const MAX_INPUTS_PER_REQUEST: usize = 100;

/// Embedder backed by an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAIEmbedder {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbedder {
    /// Create a new embedder against the public OpenAI API with default settings.
    pub fn new() -> Result<Self> {
        Self::with_config("text-embedding-3-small", 1536, None)
    }

    /// Create a new embedder with custom model, dimensions and API base.
    pub fn with_config(model: &str, dimensions: usize, api_base: Option<&str>) -> Result<Self> {
        Ok(Self {
            client: create_client(api_base)?,
            model: model.to_string(),
            dimensions,
        })
    }

    /// Only the `text-embedding-3` family accepts a requested output dimension.
    fn supports_dimensions(&self) -> bool {
        self.model.starts_with("text-embedding-3")
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    #[instrument(skip(self, text))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ScreenragError::Embedding("Empty embedding response".to_string()))
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(MAX_INPUTS_PER_REQUEST) {
            let mut args = CreateEmbeddingRequestArgs::default();
            args.model(&self.model)
                .input(EmbeddingInput::StringArray(chunk.to_vec()));
            if self.supports_dimensions() {
                args.dimensions(self.dimensions as u32);
            }
            let request = args
                .build()
                .map_err(|e| ScreenragError::Embedding(format!("Failed to build request: {}", e)))?;

            let response = self.client.embeddings().create(request).await.map_err(|e| {
                ScreenragError::Embedding(format!("Embedding API error: {}", e))
            })?;

            if response.data.len() != chunk.len() {
                return Err(ScreenragError::Embedding(format!(
                    "Requested {} embeddings, received {}",
                    chunk.len(),
                    response.data.len()
                )));
            }

            // Sort by index to ensure correct order
            let mut embeddings: Vec<_> = response.data.into_iter().collect();
            embeddings.sort_by_key(|e| e.index);

            for embedding_data in embeddings {
                if embedding_data.embedding.len() != self.dimensions {
                    return Err(ScreenragError::EmbeddingMismatch(format!(
                        "model '{}' returned {} dimensions, configured for {}",
                        self.model,
                        embedding_data.embedding.len(),
                        self.dimensions
                    )));
                }
                all_embeddings.push(embedding_data.embedding);
            }
        }

        debug!("Generated {} embeddings", all_embeddings.len());
        Ok(all_embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedder_creation() {
        let embedder = OpenAIEmbedder::new().unwrap();
        assert_eq!(embedder.dimensions(), 1536);
        assert_eq!(embedder.model(), "text-embedding-3-small");
        assert!(embedder.supports_dimensions());

        let embedder =
            OpenAIEmbedder::with_config("nomic-embed-text", 768, Some("http://localhost:11434/v1"))
                .unwrap();
        assert_eq!(embedder.dimensions(), 768);
        assert!(!embedder.supports_dimensions());
    }
}

//! Streaming chat completions against an OpenAI-compatible endpoint.

use super::{ChatMessage, Generator, TokenStream};
use crate::error::{Result, ScreenragError};
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, instrument};

/// Generator backed by `/chat/completions` with `stream: true`.
pub struct OpenAIGenerator {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: Option<f32>,
}

impl OpenAIGenerator {
    /// Create a generator for `model`, e.g. `llama3.2` behind Ollama's `/v1` API.
    pub fn new(model: &str, api_base: Option<&str>) -> Result<Self> {
        Ok(Self {
            client: create_client(api_base)?,
            model: model.to_string(),
            temperature: None,
        })
    }

    /// Set the sampling temperature (server default when `None`).
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    fn request_messages(
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<Vec<ChatCompletionRequestMessage>> {
        let build_error = |e: async_openai::error::OpenAIError| {
            ScreenragError::Generation(format!("Failed to build message: {}", e))
        };

        let mut request: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system.to_string())
                .build()
                .map_err(build_error)?
                .into(),
        ];

        for message in messages {
            request.push(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(message.content.clone())
                    .build()
                    .map_err(build_error)?
                    .into(),
            );
        }

        Ok(request)
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, system: &str, messages: &[ChatMessage]) -> Result<TokenStream> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(Self::request_messages(system, messages)?)
            .stream(true);
        if let Some(temperature) = self.temperature {
            args.temperature(temperature);
        }
        let request = args
            .build()
            .map_err(|e| ScreenragError::Generation(format!("Failed to build request: {}", e)))?;

        debug!("Opening completion stream");
        let stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e| ScreenragError::Generation(format!("Chat API error: {}", e)))?;

        let tokens = stream.filter_map(|item| async move {
            match item {
                Ok(chunk) => chunk
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.delta.content)
                    .filter(|content| !content.is_empty())
                    .map(Ok),
                Err(e) => Some(Err(ScreenragError::Generation(format!("Stream error: {}", e)))),
            }
        });

        Ok(tokens.boxed())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

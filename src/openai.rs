//! OpenAI-compatible client configuration.
//!
//! Both the embedder and the generator talk to an OpenAI-compatible HTTP API.
//! Pointing `api_base` at a local server (e.g. Ollama's `/v1` endpoint) keeps
//! the whole pipeline offline.

use crate::error::{Result, ScreenragError};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for API requests (5 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Placeholder key sent to local servers that ignore authentication.
const LOCAL_API_KEY: &str = "local";

/// Create a client for the given API base, or the public OpenAI API if `None`.
pub fn create_client(api_base: Option<&str>) -> Result<Client<OpenAIConfig>> {
    create_client_with_timeout(api_base, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create a client with a custom timeout.
pub fn create_client_with_timeout(
    api_base: Option<&str>,
    timeout: Duration,
) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ScreenragError::Config(format!("Failed to create HTTP client: {}", e)))?;

    let mut config = OpenAIConfig::default();
    if let Some(base) = api_base {
        config = config.with_api_base(base);
        if std::env::var("OPENAI_API_KEY").map_or(true, |k| k.is_empty()) {
            config = config.with_api_key(LOCAL_API_KEY);
        }
    }

    Ok(Client::with_config(config).with_http_client(http_client))
}

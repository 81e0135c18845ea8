//! Text-completion clients for the hosted and local LLM providers.
//!
//! Every pipeline step reduces to "send a prompt, receive text". The [`CompletionClient`] trait
//! captures exactly that contract so the summarization and Q&A pipelines stay independent of the
//! provider wire format. Groq is reached through its OpenAI-compatible chat endpoint; Ollama
//! through `/api/generate`.

mod groq;
mod ollama;

pub use groq::GroqClient;
pub use ollama::OllamaClient;

use crate::config::{Config, LlmProvider};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_GROQ_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Errors surfaced while requesting a completion.
#[derive(Debug, Error)]
pub enum LlmClientError {
    /// Provider could not be reached or the client could not be built.
    #[error("LLM provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("LLM request failed: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// A single prompt sent to the provider.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Model identifier understood by the provider.
    pub model: String,
    /// Fully rendered prompt.
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Interface implemented by LLM providers.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send one prompt and return the provider's text output unmodified.
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmClientError>;
}

/// Build the completion client selected by configuration.
pub fn get_completion_client(
    config: &Config,
) -> Result<Box<dyn CompletionClient>, LlmClientError> {
    let http = build_http_client(config.llm_timeout_secs)?;
    match config.llm_provider {
        LlmProvider::Groq => {
            let api_key = config.groq_api_key.clone().ok_or_else(|| {
                LlmClientError::ProviderUnavailable("GROQ_API_KEY is not configured".into())
            })?;
            let base_url = config
                .groq_url
                .clone()
                .unwrap_or_else(|| DEFAULT_GROQ_URL.to_string());
            Ok(Box::new(GroqClient::new(http, base_url, api_key)))
        }
        LlmProvider::Ollama => {
            let base_url = config
                .ollama_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
            Ok(Box::new(OllamaClient::new(http, base_url)))
        }
    }
}

fn build_http_client(timeout_secs: u64) -> Result<Client, LlmClientError> {
    Client::builder()
        .user_agent("docqa/llm")
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()
        .map_err(|error| {
            LlmClientError::ProviderUnavailable(format!("failed to build HTTP client: {error}"))
        })
}

//! LLM provider abstraction and implementations.
//!
//! Supports Anthropic Claude and `OpenAI`-compatible chat completion APIs
//! via a common trait.

pub mod anthropic;
pub mod openai;

use serde::{Deserialize, Serialize};

use crate::AiError;

/// Default model for the local Ollama server.
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3:8b";

/// Default base URL of a local Ollama server's `OpenAI`-compatible API.
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

/// A message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role: "user" or "assistant".
    pub role: String,
    /// Message text.
    pub content: String,
}

impl Message {
    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Sampling and output settings for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatOptions {
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Ask the provider to constrain output to a JSON object, where the
    /// API supports it.
    pub json_output: bool,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 256,
            json_output: false,
        }
    }
}

/// Response from the LLM provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmResponse {
    /// Concatenated text content of the reply.
    pub text: String,
    /// Why the model stopped.
    pub stop_reason: StopReason,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Model finished its response naturally.
    EndTurn,
    /// Maximum tokens reached.
    MaxTokens,
}

/// Trait for LLM providers.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request.
    ///
    /// # Errors
    ///
    /// Returns [`AiError`] if the request fails.
    async fn chat(
        &self,
        system_prompt: &str,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<LlmResponse, AiError>;
}

/// Creates an LLM provider based on environment variables.
///
/// If `AI_PROVIDER` is explicitly set, uses that provider. Otherwise
/// auto-detects from available credentials:
///
/// 1. `ANTHROPIC_API_KEY` set -> Anthropic Claude
/// 2. `OPENAI_API_KEY` set -> `OpenAI`
/// 3. Neither -> local Ollama server
///
/// `AI_MODEL` overrides the model and `AI_BASE_URL` points the `OpenAI`
/// client at any compatible server.
///
/// # Errors
///
/// Returns [`AiError::Config`] if the requested provider's key is missing
/// or the provider name is unknown.
pub fn create_provider_from_env() -> Result<Box<dyn LlmProvider>, AiError> {
    let provider = std::env::var("AI_PROVIDER").unwrap_or_else(|_| detect_provider());
    let model = std::env::var("AI_MODEL").ok();
    let base_url = std::env::var("AI_BASE_URL").ok();

    match provider.to_lowercase().as_str() {
        "anthropic" | "claude" => {
            let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| AiError::Config {
                message: "ANTHROPIC_API_KEY environment variable not set".to_string(),
            })?;
            let model = model.unwrap_or_else(|| "claude-sonnet-4-20250514".to_string());
            Ok(Box::new(anthropic::AnthropicProvider::new(api_key, model)))
        }
        "openai" | "gpt" => {
            let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| AiError::Config {
                message: "OPENAI_API_KEY environment variable not set".to_string(),
            })?;
            let model = model.unwrap_or_else(|| "gpt-4o-mini".to_string());
            let mut client = openai::OpenAiProvider::new(api_key, model);
            if let Some(url) = base_url {
                client = client.with_base_url(url);
            }
            Ok(Box::new(client))
        }
        "ollama" | "local" => {
            let model = model.unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string());
            let url = base_url.unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.to_string());
            log::info!("Using local OpenAI-compatible server at {url} with model {model}");
            Ok(Box::new(
                openai::OpenAiProvider::new("ollama".to_string(), model).with_base_url(url),
            ))
        }
        other => Err(AiError::Config {
            message: format!(
                "Unknown AI provider: {other}. Use 'anthropic', 'openai', or 'ollama'."
            ),
        }),
    }
}

/// Auto-detects which provider to use based on available credentials.
///
/// Returns a provider name string that matches the arms in
/// [`create_provider_from_env`].
fn detect_provider() -> String {
    if std::env::var("ANTHROPIC_API_KEY").is_ok() {
        log::info!("Auto-detected AI provider: Anthropic (ANTHROPIC_API_KEY found)");
        return "anthropic".to_string();
    }

    if std::env::var("OPENAI_API_KEY").is_ok() {
        log::info!("Auto-detected AI provider: OpenAI (OPENAI_API_KEY found)");
        return "openai".to_string();
    }

    log::info!(
        "No AI credentials detected, using a local Ollama server. Set ANTHROPIC_API_KEY, \
         OPENAI_API_KEY, or AI_PROVIDER to use a hosted model."
    );
    "ollama".to_string()
}

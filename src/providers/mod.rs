/*!
 * Provider implementations for remote language-model calls.
 *
 * This module contains client implementations for various LLM providers:
 * - OpenAI: OpenAI chat completions, or any compatible endpoint
 * - Anthropic: Anthropic messages API
 * - Ollama: Local LLM server
 * - Mock: scripted provider for tests
 *
 * Every client performs exactly one HTTP attempt per call. Retries, backoff
 * and rate limiting live in `annotation::retry`.
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::app_config::{ProviderKind, ProviderSettings};
use crate::errors::ProviderError;

/// One message of a chat conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender (system, user, assistant)
    pub role: String,
    /// Content of the message
    pub content: String,
}

impl ChatMessage {
    /// A system-role message
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    /// A user-role message
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

/// Provider-neutral completion request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Model identifier
    pub model: String,
    /// Conversation, system message first
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Upper bound on generated tokens
    pub max_tokens: u32,
}

impl ChatRequest {
    /// Create a request with the default token budget
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: 2048,
        }
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the token budget
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Content of the system message, if any
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages.iter()
            .find(|m| m.role == "system")
            .map(|m| m.content.as_str())
    }

    /// Content of the last user message, if any
    pub fn user_prompt(&self) -> Option<&str> {
        self.messages.iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
    }
}

/// Free-text completion returned by a provider
#[derive(Debug, Clone, Default)]
pub struct Completion {
    /// Generated text
    pub text: String,
    /// Prompt tokens reported by the provider
    pub prompt_tokens: Option<u64>,
    /// Completion tokens reported by the provider
    pub completion_tokens: Option<u64>,
}

impl Completion {
    /// A completion without usage information
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Default::default() }
    }
}

/// Common trait for all LLM providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing them to be used interchangeably by the annotation pipeline.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Complete a request using this provider
    ///
    /// # Arguments
    /// * `request` - The request to complete
    ///
    /// # Returns
    /// * `Result<Completion, ProviderError>` - The response text or an error
    async fn complete(&self, request: &ChatRequest) -> Result<Completion, ProviderError>;

    /// Human-readable provider name for logs
    fn name(&self) -> &str;
}

/// Build the client for the active provider
pub fn create_provider(settings: &ProviderSettings) -> Box<dyn Provider> {
    let endpoint = settings.get_endpoint();
    let timeout = settings.get_timeout();

    match settings.provider {
        ProviderKind::OpenAI => Box::new(openai::OpenAI::new(settings.get_api_key(), endpoint, timeout)),
        ProviderKind::Anthropic => Box::new(anthropic::Anthropic::new(settings.get_api_key(), endpoint, timeout)),
        ProviderKind::Ollama => Box::new(ollama::Ollama::new(endpoint, timeout)),
    }
}

pub mod anthropic;
pub mod mock;
pub mod ollama;
pub mod openai;

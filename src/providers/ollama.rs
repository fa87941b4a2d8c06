use async_trait::async_trait;
use log::error;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::ProviderError;
use super::{ChatMessage, ChatRequest, Completion, Provider};

/// Ollama client for interacting with Ollama API
#[derive(Debug)]
pub struct Ollama {
    /// Base URL of the Ollama API
    base_url: String,
    /// HTTP client for making requests
    client: Client,
}

/// Generation options for the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Temperature for generation (default: 0.8)
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Chat request for the Ollama API
#[derive(Debug, Serialize)]
pub struct OllamaChatRequest {
    /// Model name to use for generation
    model: String,
    /// Messages of the conversation
    messages: Vec<ChatMessage>,
    /// Additional model parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
    /// Whether to stream the response
    stream: bool,
}

impl From<&ChatRequest> for OllamaChatRequest {
    fn from(request: &ChatRequest) -> Self {
        Self {
            model: request.model.clone(),
            messages: request.messages.clone(),
            options: Some(GenerationOptions {
                temperature: request.temperature,
                num_predict: Some(request.max_tokens),
            }),
            stream: false,
        }
    }
}

/// Chat response from the Ollama API
#[derive(Debug, Deserialize)]
pub struct OllamaChatResponse {
    /// Model name
    pub model: String,
    /// Response message
    pub message: ChatMessage,
    /// Whether the generation is complete
    pub done: bool,
    /// Number of prompt tokens
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    /// Number of generated tokens
    #[serde(default)]
    pub eval_count: Option<u64>,
}

impl Ollama {
    /// Create a new Ollama client from a base URL such as `http://localhost:11434`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into();
        let base_url = if base_url.starts_with("http://") || base_url.starts_with("https://") {
            base_url
        } else {
            format!("http://{}", base_url)
        };

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::builder()
                .timeout(timeout)
                // Ollama speaks HTTP/1.1
                .http1_only()
                .pool_idle_timeout(Duration::from_secs(90))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Parse a chat response body
    ///
    /// Some Ollama builds stream JSONL even when `stream` is false; in that
    /// case the message fragments are concatenated.
    pub fn parse_chat_body(body: &str) -> Result<OllamaChatResponse, ProviderError> {
        if let Ok(parsed) = serde_json::from_str::<OllamaChatResponse>(body) {
            return Ok(parsed);
        }

        let mut content = String::new();
        let mut last: Option<OllamaChatResponse> = None;
        for line in body.lines().filter(|l| !l.trim().is_empty()) {
            let chunk = serde_json::from_str::<OllamaChatResponse>(line)
                .map_err(|e| ProviderError::ParseError(format!("Invalid Ollama response line: {}", e)))?;
            content.push_str(&chunk.message.content);
            last = Some(chunk);
        }

        let mut last = last.ok_or_else(|| ProviderError::ParseError("Empty Ollama response".to_string()))?;
        last.message.content = content;
        Ok(last)
    }
}

#[async_trait]
impl Provider for Ollama {
    async fn complete(&self, request: &ChatRequest) -> Result<Completion, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = OllamaChatRequest::from(request);

        let response = self.client.post(&url)
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::from_transport)?;

        let status = response.status();
        let response_text = response.text().await
            .map_err(|e| ProviderError::RequestFailed(format!("Failed to get response text from Ollama API: {}", e)))?;

        if !status.is_success() {
            error!("Ollama API error ({}): {}", status, response_text);
            return Err(ProviderError::from_status(status.as_u16(), response_text));
        }

        let parsed = Self::parse_chat_body(&response_text)?;
        Ok(Completion {
            text: parsed.message.content,
            prompt_tokens: parsed.prompt_eval_count,
            completion_tokens: parsed.eval_count,
        })
    }

    fn name(&self) -> &str {
        "Ollama"
    }
}

use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::errors::AppError;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Language of the book text (ISO)
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Language the glosses are written in (ISO)
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Remote model provider settings
    #[serde(default)]
    pub provider: ProviderSettings,

    /// Retry policy for remote calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Batching and rewriting settings
    #[serde(default)]
    pub annotation: AnnotationConfig,

    /// Newline-delimited list of words that are never glossed
    #[serde(default = "default_vocabulary_path")]
    pub vocabulary_path: String,

    /// Where resumable progress is kept while a book is being processed
    #[serde(default = "default_progress_path")]
    pub progress_path: String,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Remote model provider type
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    // @provider: OpenAI or any OpenAI-compatible endpoint
    #[default]
    OpenAI,
    // @provider: Anthropic
    Anthropic,
    // @provider: Ollama
    Ollama,
}

impl ProviderKind {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::OpenAI => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::Ollama => "Ollama",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::OpenAI => "openai".to_string(),
            Self::Anthropic => "anthropic".to_string(),
            Self::Ollama => "ollama".to_string(),
        }
    }

    /// Whether the provider refuses requests without a credential
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Per-provider connection settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Rate limit (requests per minute)
    #[serde(default)]
    pub rate_limit: Option<u32>,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: ProviderKind) -> Self {
        Self {
            provider_type: provider_type.to_lowercase_string(),
            model: default_model(&provider_type),
            api_key: String::new(),
            endpoint: default_endpoint(&provider_type),
            timeout_secs: default_timeout_secs(),
            rate_limit: default_rate_limit(&provider_type),
        }
    }
}

/// Which provider is active and how each one is reached
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderSettings {
    /// Provider to use
    #[serde(default)]
    pub provider: ProviderKind,

    /// Available providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            available_providers: vec![
                ProviderConfig::new(ProviderKind::OpenAI),
                ProviderConfig::new(ProviderKind::Anthropic),
                ProviderConfig::new(ProviderKind::Ollama),
            ],
        }
    }
}

impl ProviderSettings {
    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        self.get_provider_config(&self.provider)
    }

    /// Get a specific provider configuration by type
    pub fn get_provider_config(&self, provider_type: &ProviderKind) -> Option<&ProviderConfig> {
        let provider_str = provider_type.to_lowercase_string();
        self.available_providers.iter()
            .find(|p| p.provider_type == provider_str)
    }

    /// Get the active provider configuration, inserting defaults if it is missing
    pub fn active_provider_config_mut(&mut self) -> &mut ProviderConfig {
        let provider_str = self.provider.to_lowercase_string();
        let index = match self.available_providers.iter().position(|p| p.provider_type == provider_str) {
            Some(index) => index,
            None => {
                self.available_providers.push(ProviderConfig::new(self.provider.clone()));
                self.available_providers.len() - 1
            }
        };
        &mut self.available_providers[index]
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        self.get_active_provider_config()
            .map(|p| p.model.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| default_model(&self.provider))
    }

    /// Get the API key for the active provider
    pub fn get_api_key(&self) -> String {
        self.get_active_provider_config()
            .map(|p| p.api_key.clone())
            .unwrap_or_default()
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        self.get_active_provider_config()
            .map(|p| p.endpoint.clone())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| default_endpoint(&self.provider))
    }

    /// Get the request timeout for the active provider
    pub fn get_timeout(&self) -> Duration {
        let secs = self.get_active_provider_config()
            .map(|p| p.timeout_secs)
            .filter(|t| *t > 0)
            .unwrap_or_else(default_timeout_secs);
        Duration::from_secs(secs)
    }

    /// Get the rate limit for the active provider
    pub fn get_rate_limit(&self) -> Option<u32> {
        match self.get_active_provider_config() {
            Some(provider_config) => provider_config.rate_limit,
            None => default_rate_limit(&self.provider),
        }
    }
}

/// Retry policy settings for remote calls
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RetryConfig {
    /// Total attempts per remote call, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Shortest wait between attempts in milliseconds
    #[serde(default = "default_min_backoff_ms")]
    pub min_backoff_ms: u64,

    /// Longest wait between attempts in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            min_backoff_ms: default_min_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Settings for batching chapter prose and rewriting it
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AnnotationConfig {
    /// Characters accumulated before a batch is sent for extraction
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Upper bound on words requested per batch
    #[serde(default = "default_max_words_per_batch")]
    pub max_words_per_batch: usize,

    /// Elements whose direct text is treated as prose
    #[serde(default = "default_block_tags")]
    pub block_tags: Vec<String>,

    /// Elements whose content is never read or rewritten
    #[serde(default = "default_excluded_tags")]
    pub excluded_tags: Vec<String>,

    /// Class names that mark an element as code or formula content
    #[serde(default = "default_excluded_classes")]
    pub excluded_classes: Vec<String>,

    /// Temperature parameter for text generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_words_per_batch: default_max_words_per_batch(),
            block_tags: default_block_tags(),
            excluded_tags: default_excluded_tags(),
            excluded_classes: default_excluded_classes(),
            temperature: default_temperature(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// The matching `log` filter
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_source_language() -> String {
    "en".to_string()
}

fn default_target_language() -> String {
    "zh".to_string()
}

fn default_vocabulary_path() -> String {
    "vocabulary.txt".to_string()
}

fn default_progress_path() -> String {
    "progress.json".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    5
}

fn default_min_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

fn default_batch_size() -> usize {
    5000
}

fn default_max_words_per_batch() -> usize {
    8
}

fn default_block_tags() -> Vec<String> {
    vec!["p".to_string()]
}

fn default_excluded_tags() -> Vec<String> {
    ["code", "pre", "math"].iter().map(|s| s.to_string()).collect()
}

fn default_excluded_classes() -> Vec<String> {
    ["code", "math", "formula"].iter().map(|s| s.to_string()).collect()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_model(provider: &ProviderKind) -> String {
    match provider {
        ProviderKind::OpenAI => "gpt-4o-mini".to_string(),
        ProviderKind::Anthropic => "claude-3-haiku-20240307".to_string(),
        ProviderKind::Ollama => "llama3.2:3b".to_string(),
    }
}

fn default_endpoint(provider: &ProviderKind) -> String {
    match provider {
        ProviderKind::OpenAI => "https://api.openai.com/v1".to_string(),
        ProviderKind::Anthropic => "https://api.anthropic.com".to_string(),
        ProviderKind::Ollama => "http://localhost:11434".to_string(),
    }
}

fn default_rate_limit(provider: &ProviderKind) -> Option<u32> {
    match provider {
        ProviderKind::OpenAI => Some(20),
        // Slightly below Anthropic's 50 requests per minute tier
        ProviderKind::Anthropic => Some(45),
        ProviderKind::Ollama => None,
    }
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        crate::language_utils::get_language_name(&self.source_language)?;
        crate::language_utils::get_language_name(&self.target_language)?;

        let provider = &self.provider.provider;
        if provider.requires_api_key() && self.provider.get_api_key().is_empty() {
            return Err(AppError::Config(format!(
                "API key is required for the {} provider (set it in the config file or pass --api-key)",
                provider.display_name()
            )).into());
        }

        let endpoint = self.provider.get_endpoint();
        Url::parse(&endpoint)
            .map_err(|e| AppError::Config(format!("Invalid endpoint '{}': {}", endpoint, e)))?;

        if self.annotation.batch_size == 0 {
            return Err(AppError::Config("annotation.batch_size must be greater than zero".to_string()).into());
        }

        if self.annotation.block_tags.is_empty() {
            return Err(AppError::Config("annotation.block_tags must name at least one element".to_string()).into());
        }

        if self.retry.max_attempts == 0 {
            return Err(AppError::Config("retry.max_attempts must be at least 1".to_string()).into());
        }

        if self.retry.min_backoff_ms > self.retry.max_backoff_ms {
            return Err(AppError::Config("retry.min_backoff_ms cannot exceed retry.max_backoff_ms".to_string()).into());
        }

        Ok(())
    }

    /// Load the configuration file, writing a default one when it does not exist
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;
            let config: Config = serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            return Ok(config);
        }

        warn!("Config file not found at '{}', creating default config.", path.display());
        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write default config to file: {}", path.display()))?;

        Ok(config)
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: default_source_language(),
            target_language: default_target_language(),
            provider: ProviderSettings::default(),
            retry: RetryConfig::default(),
            annotation: AnnotationConfig::default(),
            vocabulary_path: default_vocabulary_path(),
            progress_path: default_progress_path(),
            log_level: LogLevel::default(),
        }
    }
}

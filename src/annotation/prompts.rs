/*!
 * Prompt templates for vocabulary extraction and translation.
 */

use anyhow::Result;

use crate::app_config::Config;
use crate::language_utils;

/// Everything the extraction and translation prompts need besides the text
#[derive(Debug, Clone)]
pub struct PromptContext {
    /// Model identifier sent with every request
    pub model: String,
    /// English name of the book language
    pub source_language: String,
    /// English name of the gloss language
    pub target_language: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Upper bound on words requested per batch
    pub max_words_per_batch: usize,
}

impl PromptContext {
    /// Build the context from a validated configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            model: config.provider.get_model(),
            source_language: language_utils::get_language_name(&config.source_language)?,
            target_language: language_utils::get_language_name(&config.target_language)?,
            temperature: config.annotation.temperature,
            max_words_per_batch: config.annotation.max_words_per_batch,
        })
    }
}

/// A prompt with `{placeholder}` variables
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: &'static str,
}

impl PromptTemplate {
    /// System prompt for picking vocabulary out of a passage
    pub const EXTRACTION_SYSTEM: &'static str = "You are an experienced instructor of {source_language}. \
Your task is to pick out important, moderately difficult {source_language} words \
from passages that learners are reading.";

    /// User prompt for picking vocabulary out of a passage
    pub const EXTRACTION_USER: &'static str = "Extract between 0 and {max_words} important, moderately difficult \
{source_language} words that appear verbatim in the passage below. \
List only the words, separated by commas. \
If no word qualifies, reply with an empty string.\n\n\
Passage:\n{text}";

    /// System prompt for glossing a word list
    pub const TRANSLATION_SYSTEM: &'static str = "You are an expert {source_language} to {target_language} translator.";

    /// User prompt for glossing a word list
    pub const TRANSLATION_USER: &'static str = "Translate each of the following {source_language} words into \
{target_language}. Give a concise translation without explanations. \
If a word cannot be translated, keep the original word as its translation.\n\n\
Reply with ONLY a JSON array of objects of the form \
{\"word\": \"<word>\", \"translation\": \"<translation>\"}, \
one object per word, in the same order as the list.\n\n\
Words:\n{words}";

    /// Wrap a template string
    pub const fn new(template: &'static str) -> Self {
        Self { template }
    }

    /// Replace each `{key}` with its value
    pub fn render(&self, variables: &[(&str, &str)]) -> String {
        variables.iter().fold(self.template.to_string(), |text, (key, value)| {
            text.replace(&format!("{{{}}}", key), value)
        })
    }
}

use log::debug;
use std::collections::HashSet;

use crate::errors::ProviderError;
use crate::providers::{ChatMessage, ChatRequest};
use super::prompts::{PromptContext, PromptTemplate};
use super::retry::RetryingCaller;

const QUOTES: &[char] = &['"', '\'', '`', '“', '”', '‘', '’', '«', '»', '「', '」'];

/// Asks the model for the vocabulary worth glossing in a batch of prose
#[derive(Debug, Clone)]
pub struct VocabularyExtractor {
    context: PromptContext,
}

impl VocabularyExtractor {
    pub fn new(context: PromptContext) -> Self {
        Self { context }
    }

    /// Build the extraction request for one batch
    pub fn build_request(&self, batch: &str) -> ChatRequest {
        let max_words = self.context.max_words_per_batch.to_string();
        let system = PromptTemplate::new(PromptTemplate::EXTRACTION_SYSTEM)
            .render(&[("source_language", self.context.source_language.as_str())]);
        let user = PromptTemplate::new(PromptTemplate::EXTRACTION_USER).render(&[
            ("source_language", self.context.source_language.as_str()),
            ("max_words", max_words.as_str()),
            ("text", batch),
        ]);

        ChatRequest::new(&self.context.model, vec![ChatMessage::system(system), ChatMessage::user(user)])
            .temperature(self.context.temperature)
    }

    /// Extract candidate words from `batch`, dropping excluded ones
    pub async fn extract(
        &self,
        caller: &mut RetryingCaller,
        batch: &str,
        exclusions: &HashSet<String>,
    ) -> Result<Vec<String>, ProviderError> {
        let completion = caller.call(&self.build_request(batch)).await?;
        let words = parse_candidates(&completion.text, exclusions);
        debug!("Extracted {} candidate(s): {:?}", words.len(), words);
        Ok(words)
    }
}

/// Split a free-text reply into candidate words
///
/// Entries are separated by ASCII or full-width commas or newlines, trimmed
/// of whitespace and quotes. Empty entries and excluded words (compared
/// lowercase) are dropped. Duplicates are kept.
pub fn parse_candidates(reply: &str, exclusions: &HashSet<String>) -> Vec<String> {
    reply.split([',', '，', '\n'])
        .map(|entry| entry.trim().trim_matches(QUOTES).trim())
        .filter(|word| !word.is_empty())
        .filter(|word| !exclusions.contains(&word.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// Per-chapter candidate list, deduplicated case-insensitively
///
/// The first casing seen for a word is kept, as is first-seen order.
#[derive(Debug, Default, Clone)]
pub struct CandidateList {
    words: Vec<String>,
    seen: HashSet<String>,
}

impl CandidateList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add words, ignoring ones already present in any casing
    pub fn extend<I: IntoIterator<Item = String>>(&mut self, words: I) {
        for word in words {
            if self.seen.insert(word.to_lowercase()) {
                self.words.push(word);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.words
    }

    pub fn into_vec(self) -> Vec<String> {
        self.words
    }
}

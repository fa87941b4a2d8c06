/*!
 * Translation of a chapter's candidate words into glosses.
 *
 * The model is asked for a JSON array of `{"word", "translation"}` pairs.
 * An object mapping each word to its translation is accepted too. Replies
 * are matched back to the candidates by word, never by position; a plain
 * comma-separated reply without any JSON in it is only trusted when it has
 * exactly one entry per candidate.
 */

use log::{debug, warn};
use serde::Deserialize;
use std::collections::HashMap;

use crate::errors::ProviderError;
use crate::providers::{ChatMessage, ChatRequest};
use super::prompts::{PromptContext, PromptTemplate};
use super::retry::RetryingCaller;

/// Ordered word to gloss mapping for one chapter
///
/// Entries whose gloss is the word itself are never stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslationMap {
    entries: Vec<(String, String)>,
}

impl TranslationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pair, returning false when it was dropped as a no-op
    pub fn insert(&mut self, word: impl Into<String>, gloss: impl Into<String>) -> bool {
        let word = word.into();
        let gloss = gloss.into().trim().to_string();
        if gloss.is_empty() || gloss.to_lowercase() == word.trim().to_lowercase() {
            return false;
        }
        if self.get(&word).is_some() {
            return false;
        }
        self.entries.push((word, gloss));
        true
    }

    /// Gloss for `word`, compared case-insensitively
    pub fn get(&self, word: &str) -> Option<&str> {
        let word = word.to_lowercase();
        self.entries.iter()
            .find(|(w, _)| w.to_lowercase() == word)
            .map(|(_, gloss)| gloss.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(w, g)| (w.as_str(), g.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct TranslationPair {
    word: String,
    #[serde(alias = "gloss")]
    translation: String,
}

/// Turns a candidate list into glosses with one remote call
#[derive(Debug, Clone)]
pub struct TranslationResolver {
    context: PromptContext,
}

impl TranslationResolver {
    pub fn new(context: PromptContext) -> Self {
        Self { context }
    }

    /// Build the translation request for a candidate list
    pub fn build_request(&self, words: &[String]) -> ChatRequest {
        let word_list = words.join("\n");
        let languages = [
            ("source_language", self.context.source_language.as_str()),
            ("target_language", self.context.target_language.as_str()),
        ];
        let system = PromptTemplate::new(PromptTemplate::TRANSLATION_SYSTEM).render(&languages);
        let user = PromptTemplate::new(PromptTemplate::TRANSLATION_USER)
            .render(&[languages[0], languages[1], ("words", word_list.as_str())]);

        ChatRequest::new(&self.context.model, vec![ChatMessage::system(system), ChatMessage::user(user)])
            .temperature(self.context.temperature)
    }

    /// Translate `words`; an empty list makes no remote call
    pub async fn resolve(
        &self,
        caller: &mut RetryingCaller,
        words: &[String],
    ) -> Result<TranslationMap, ProviderError> {
        if words.is_empty() {
            return Ok(TranslationMap::new());
        }

        let completion = caller.call(&self.build_request(words)).await?;
        let map = pair_translations(words, &completion.text);
        debug!("Resolved {} of {} word(s) to glosses", map.len(), words.len());
        Ok(map)
    }
}

/// Structured reply shapes that can be matched back by word
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TranslationReply {
    Pairs(Vec<TranslationPair>),
    Map(HashMap<String, String>),
}

impl TranslationReply {
    fn into_glosses(self) -> HashMap<String, String> {
        let entries: Vec<(String, String)> = match self {
            TranslationReply::Pairs(pairs) => pairs.into_iter().map(|p| (p.word, p.translation)).collect(),
            TranslationReply::Map(map) => map.into_iter().collect(),
        };

        let mut glosses = HashMap::new();
        for (word, gloss) in entries {
            glosses.entry(word.trim().to_lowercase()).or_insert(gloss);
        }
        glosses
    }
}

/// Match a translation reply back to the candidate words
pub fn pair_translations(words: &[String], reply: &str) -> TranslationMap {
    let mut map = TranslationMap::new();

    if let Some(parsed) = parse_json_reply(reply) {
        let glosses = parsed.into_glosses();
        let mut missing = Vec::new();
        for word in words {
            match glosses.get(&word.to_lowercase()) {
                Some(gloss) => {
                    map.insert(word.clone(), gloss.clone());
                }
                None => missing.push(word.as_str()),
            }
        }
        if !missing.is_empty() {
            warn!("Translation reply omitted {} word(s), leaving them unglossed: {}",
                missing.len(), missing.join(", "));
        }
        return map;
    }

    // Anything JSON-like that failed to parse as word pairs cannot be split safely
    if reply.contains(['[', '{', '"']) {
        warn!("Translation reply has no word/translation pairs, leaving the chapter unglossed");
        return map;
    }

    let glosses: Vec<&str> = reply.split([',', '，'])
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .collect();

    if glosses.len() == words.len() {
        warn!("Translation reply was not JSON, pairing {} comma-separated glosses by position", glosses.len());
        for (word, gloss) in words.iter().zip(glosses) {
            map.insert(word.clone(), gloss);
        }
    } else {
        warn!("Unusable translation reply ({} entries for {} words), leaving the chapter unglossed",
            glosses.len(), words.len());
    }

    map
}

/// Parse the JSON array or object embedded in a reply, tolerating surrounding prose or fences
fn parse_json_reply(reply: &str) -> Option<TranslationReply> {
    let mut slices: Vec<&str> = [('[', ']'), ('{', '}')]
        .iter()
        .filter_map(|&(open, close)| {
            let start = reply.find(open)?;
            let end = reply.rfind(close)?;
            (end > start).then(|| &reply[start..=end])
        })
        .collect();
    slices.sort_by_key(|slice| slice.as_ptr() as usize);

    slices.into_iter().find_map(|slice| serde_json::from_str(slice).ok())
}

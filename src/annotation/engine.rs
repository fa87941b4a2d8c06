/*!
 * Inline gloss insertion.
 *
 * Each glossed word is wrapped as `<ruby>word<rt>gloss</rt></ruby>` at its
 * first whole-word occurrence in a chapter. Matching runs against the
 * original text of each node, so inserted markup is never matched again.
 */

use log::warn;
use once_cell::sync::Lazy;
use quick_xml::escape::{escape, partial_escape};
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;
use std::ops::Range;

use crate::errors::DocumentError;
use super::markup::{self, MarkupRules};
use super::translation::TranslationMap;

/// Character and entity references in raw text, which must never be split
static ENTITY_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&[^;\s&<]*;").expect("entity pattern is valid")
});

/// Words already glossed in the current chapter, stored lowercase
#[derive(Debug, Default, Clone)]
pub struct ReplacedSet {
    words: HashSet<String>,
}

impl ReplacedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(&word.to_lowercase())
    }

    /// Record `word`, returning false if it was already present
    pub fn insert(&mut self, word: &str) -> bool {
        self.words.insert(word.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// A glossed word with its compiled matcher
struct GlossPattern<'a> {
    word: &'a str,
    gloss: &'a str,
    regex: Regex,
}

/// Rewrites chapter markup, inserting glosses at first occurrences
#[derive(Debug, Clone, Default)]
pub struct AnnotationEngine {
    rules: MarkupRules,
}

impl AnnotationEngine {
    pub fn new(rules: MarkupRules) -> Self {
        Self { rules }
    }

    /// Annotate one chapter
    ///
    /// `replaced` carries the words glossed so far in this chapter and is
    /// updated with every substitution made.
    pub fn annotate(
        &self,
        markup: &str,
        translations: &TranslationMap,
        replaced: &mut ReplacedSet,
    ) -> Result<String, DocumentError> {
        let patterns: Vec<GlossPattern> = translations.iter()
            .filter_map(|(word, gloss)| match word_pattern(word) {
                Some(regex) => Some(GlossPattern { word, gloss, regex }),
                None => {
                    warn!("Skipping word that cannot be matched: {:?}", word);
                    None
                }
            })
            .collect();

        if patterns.is_empty() {
            return Ok(markup.to_string());
        }

        markup::rewrite_text(markup, &self.rules, |raw| annotate_text(raw, &patterns, replaced))
    }
}

/// Case-insensitive whole-word matcher for `word`
///
/// Word boundaries are only required on sides where the word starts or ends
/// with a word character, so entries like `e.g.` still match. Node text is
/// matched in its raw form, so `&`, `<` and `>` in the word are escaped first;
/// other entity spellings of a character (`&#39;` for `'`) are not matched.
fn word_pattern(word: &str) -> Option<Regex> {
    let escaped = partial_escape(word.trim());
    let word: &str = &escaped;
    let is_word_char = |c: char| c.is_alphanumeric() || c == '_';
    let first = word.chars().next()?;
    let last = word.chars().next_back()?;

    let pattern = format!(
        "{}{}{}",
        if is_word_char(first) { r"\b" } else { "" },
        regex::escape(word),
        if is_word_char(last) { r"\b" } else { "" },
    );

    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .ok()
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

/// True when `range` cuts through `entity` instead of covering it whole
fn splits(entity: &Range<usize>, range: &Range<usize>) -> bool {
    overlaps(entity, range) && !(range.start <= entity.start && entity.end <= range.end)
}

/// Insert glosses into one raw text node, or `None` when nothing matched
fn annotate_text(raw: &str, patterns: &[GlossPattern], replaced: &mut ReplacedSet) -> Option<String> {
    let entities: Vec<Range<usize>> = ENTITY_REF.find_iter(raw).map(|m| m.range()).collect();
    let mut claimed: Vec<Range<usize>> = Vec::new();
    let mut hits: Vec<(Range<usize>, &str)> = Vec::new();

    for pattern in patterns {
        if replaced.contains(pattern.word) {
            continue;
        }

        let found = pattern.regex.find_iter(raw)
            .map(|m| m.range())
            .find(|range| {
                !claimed.iter().any(|taken| overlaps(taken, range))
                    && !entities.iter().any(|entity| splits(entity, range))
            });

        if let Some(range) = found {
            claimed.push(range.clone());
            hits.push((range, pattern.gloss));
            replaced.insert(pattern.word);
        }
    }

    if hits.is_empty() {
        return None;
    }

    hits.sort_by_key(|(range, _)| range.start);

    let mut output = String::with_capacity(raw.len() + hits.len() * 32);
    let mut cursor = 0;
    for (range, gloss) in hits {
        output.push_str(&raw[cursor..range.start]);
        output.push_str("<ruby>");
        output.push_str(&raw[range.clone()]);
        output.push_str("<rt>");
        output.push_str(&escape(gloss));
        output.push_str("</rt></ruby>");
        cursor = range.end;
    }
    output.push_str(&raw[cursor..]);
    Some(output)
}

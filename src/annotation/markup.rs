/*!
 * Streaming walk over chapter XHTML.
 *
 * The walker tracks open elements with `quick_xml` and reports the text nodes
 * that are direct children of a paragraph-like block. Rewriting splices new
 * text into the original byte ranges of those nodes, so every other byte of
 * the chapter is left exactly as it was.
 */

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashSet;
use std::ops::Range;

use crate::app_config::AnnotationConfig;
use crate::errors::DocumentError;

/// Which elements hold prose and which hold code or formulas
#[derive(Debug, Clone)]
pub struct MarkupRules {
    block_tags: HashSet<String>,
    excluded_tags: HashSet<String>,
    excluded_classes: HashSet<String>,
}

impl Default for MarkupRules {
    fn default() -> Self {
        Self::from(&AnnotationConfig::default())
    }
}

impl From<&AnnotationConfig> for MarkupRules {
    fn from(config: &AnnotationConfig) -> Self {
        let lowercase = |items: &[String]| items.iter().map(|s| s.trim().to_lowercase()).collect();
        Self {
            block_tags: lowercase(&config.block_tags),
            excluded_tags: lowercase(&config.excluded_tags),
            excluded_classes: lowercase(&config.excluded_classes),
        }
    }
}

impl MarkupRules {
    fn is_block(&self, name: &str) -> bool {
        self.block_tags.contains(name)
    }

    fn excludes(&self, name: &str, element: &BytesStart) -> bool {
        if self.excluded_tags.contains(name) {
            return true;
        }

        element.attributes()
            .with_checks(false)
            .flatten()
            .filter(|attr| attr.key.local_name().as_ref() == b"class")
            .any(|attr| {
                let value = String::from_utf8_lossy(&attr.value).to_lowercase();
                value.split_whitespace().any(|class| self.excluded_classes.contains(class))
            })
    }
}

/// A run of text directly inside a paragraph-like block
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    /// Entity-decoded text
    pub text: String,
    /// Set when the block sits in code, preformatted or math content
    pub excluded: bool,
}

/// Raw view of one eligible text node
struct TextNode<'a> {
    raw: &'a str,
    range: Range<usize>,
    excluded: bool,
}

#[derive(Debug)]
struct OpenElement {
    name: String,
    excluded: bool,
}

fn local_name(element: &BytesStart) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).to_lowercase()
}

/// Visit every text node whose parent element is a block
fn walk<'a, F>(markup: &'a str, rules: &MarkupRules, mut visit: F) -> Result<(), DocumentError>
where
    F: FnMut(TextNode<'a>),
{
    let mut reader = Reader::from_str(markup);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;

    let mut stack: Vec<OpenElement> = Vec::new();

    loop {
        let start = reader.buffer_position() as usize;
        let event = reader.read_event().map_err(|e| DocumentError::Markup {
            location: format!("byte {}", reader.error_position()),
            message: e.to_string(),
        })?;
        let end = reader.buffer_position() as usize;

        match event {
            Event::Start(element) => {
                let name = local_name(&element);
                let inherited = stack.last().is_some_and(|open| open.excluded);
                let excluded = inherited || rules.excludes(&name, &element);
                stack.push(OpenElement { name, excluded });
            }
            Event::End(element) => {
                let name = String::from_utf8_lossy(element.local_name().as_ref()).to_lowercase();
                // Unbalanced end tags are tolerated: close up to the matching element, if any
                if let Some(index) = stack.iter().rposition(|open| open.name == name) {
                    stack.truncate(index);
                }
            }
            Event::Text(_) => {
                if let Some(parent) = stack.last().filter(|open| rules.is_block(&open.name)) {
                    visit(TextNode {
                        raw: &markup[start..end],
                        range: start..end,
                        excluded: parent.excluded,
                    });
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(())
}

/// Decode character and XML entity references, keeping the raw text when
/// it contains references the XML parser does not know (e.g. `&nbsp;`)
pub fn decode_text(raw: &str) -> String {
    quick_xml::escape::unescape(raw)
        .map(|text| text.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// All text spans that are direct children of a block, in document order
pub fn text_spans(markup: &str, rules: &MarkupRules) -> Result<Vec<TextSpan>, DocumentError> {
    let mut spans = Vec::new();
    walk(markup, rules, |node| {
        spans.push(TextSpan {
            text: decode_text(node.raw),
            excluded: node.excluded,
        });
    })?;
    Ok(spans)
}

/// Rewrite eligible text nodes
///
/// `rewrite` receives the raw (still escaped) text of every non-excluded
/// block text node in document order and returns replacement markup, or
/// `None` to keep the node unchanged.
pub fn rewrite_text<F>(markup: &str, rules: &MarkupRules, mut rewrite: F) -> Result<String, DocumentError>
where
    F: FnMut(&str) -> Option<String>,
{
    let mut edits: Vec<(Range<usize>, String)> = Vec::new();
    walk(markup, rules, |node| {
        if node.excluded {
            return;
        }
        if let Some(replacement) = rewrite(node.raw) {
            edits.push((node.range, replacement));
        }
    })?;

    if edits.is_empty() {
        return Ok(markup.to_string());
    }

    let mut output = String::with_capacity(markup.len() + edits.len() * 32);
    let mut cursor = 0;
    for (range, replacement) in edits {
        output.push_str(&markup[cursor..range.start]);
        output.push_str(&replacement);
        cursor = range.end;
    }
    output.push_str(&markup[cursor..]);
    Ok(output)
}

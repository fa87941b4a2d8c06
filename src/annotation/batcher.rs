use crate::errors::DocumentError;
use super::markup::{self, MarkupRules, TextSpan};

/// Accumulates chapter prose into size-bounded batches
///
/// Every included span is appended with a trailing space. A batch is emitted
/// as soon as the buffer reaches `batch_size` characters; whatever is left
/// at the end is emitted once more unless it is blank.
#[derive(Debug)]
pub struct TextBatcher {
    spans: std::vec::IntoIter<TextSpan>,
    batch_size: usize,
    buffer: String,
    buffered_chars: usize,
}

impl TextBatcher {
    /// Batch already extracted spans; excluded spans are skipped
    pub fn new(spans: Vec<TextSpan>, batch_size: usize) -> Self {
        Self {
            spans: spans.into_iter(),
            batch_size: batch_size.max(1),
            buffer: String::new(),
            buffered_chars: 0,
        }
    }

    /// Scan chapter markup and batch its prose
    pub fn from_markup(markup: &str, rules: &MarkupRules, batch_size: usize) -> Result<Self, DocumentError> {
        Ok(Self::new(markup::text_spans(markup, rules)?, batch_size))
    }

    fn take_buffer(&mut self) -> String {
        self.buffered_chars = 0;
        std::mem::take(&mut self.buffer)
    }
}

impl Iterator for TextBatcher {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        for span in self.spans.by_ref() {
            if span.excluded || span.text.trim().is_empty() {
                continue;
            }

            self.buffer.push_str(&span.text);
            self.buffer.push(' ');
            self.buffered_chars += span.text.chars().count() + 1;

            if self.buffered_chars >= self.batch_size {
                return Some(self.take_buffer());
            }
        }

        if self.buffer.trim().is_empty() {
            self.take_buffer();
            return None;
        }
        Some(self.take_buffer())
    }
}

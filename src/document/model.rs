/*!
 * In-memory book model.
 *
 * The pipeline never touches the container while it runs; it reads and
 * rewrites chapters held here and the container is written once at the end.
 */

use std::collections::HashSet;

use crate::errors::DocumentError;

/// One XHTML content document of the book
#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    /// Manifest item id, stable across runs
    pub id: String,
    /// Archive entry the chapter was read from
    pub href: String,
    /// Current chapter markup
    pub content: String,
    /// Set once the chapter has been annotated
    pub processed: bool,
}

impl Chapter {
    pub fn new(id: impl Into<String>, href: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            href: href.into(),
            content: content.into(),
            processed: false,
        }
    }
}

/// Ordered chapters of a book, in manifest order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    chapters: Vec<Chapter>,
}

impl Document {
    /// Create a document, rejecting duplicate chapter ids
    pub fn new(chapters: Vec<Chapter>) -> Result<Self, DocumentError> {
        let mut seen = HashSet::new();
        if let Some(duplicate) = chapters.iter().find(|c| !seen.insert(c.id.as_str())) {
            return Err(DocumentError::DuplicateChapter(duplicate.id.clone()));
        }
        Ok(Self { chapters })
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn chapters_mut(&mut self) -> &mut [Chapter] {
        &mut self.chapters
    }

    pub fn chapter(&self, id: &str) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.id == id)
    }

    pub fn chapter_mut(&mut self, id: &str) -> Option<&mut Chapter> {
        self.chapters.iter_mut().find(|c| c.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.chapter(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    /// Ids of processed chapters, in document order
    pub fn processed_ids(&self) -> Vec<String> {
        self.chapters.iter()
            .filter(|c| c.processed)
            .map(|c| c.id.clone())
            .collect()
    }

    /// Number of chapters still to be annotated
    pub fn pending_count(&self) -> usize {
        self.chapters.iter().filter(|c| !c.processed).count()
    }
}

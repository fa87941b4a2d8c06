/*!
 * Progress store for resumable runs.
 *
 * This module handles:
 * - Saving processed chapters and their markup after every chapter
 * - Restoring that state onto a freshly read document
 * - Discarding progress once the whole book is written
 */

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::document::Document;
use crate::file_utils::FileManager;

use super::models::{ProgressRecord, ResumeResult};

/// Persists and restores chapter-level progress in a JSON file
#[derive(Debug, Clone)]
pub struct ProgressStore {
    /// Progress file location
    path: PathBuf,
    /// Fingerprint of the source container, if known
    fingerprint: Option<String>,
}

impl ProgressStore {
    /// Create a store backed by `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), fingerprint: None }
    }

    /// Tie saved progress to the source container with this fingerprint
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    /// Progress file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a progress file exists
    pub fn exists(&self) -> bool {
        FileManager::file_exists(&self.path)
    }

    /// Atomically write processed ids and every chapter's current markup
    pub fn save(&self, document: &Document) -> Result<()> {
        let record = ProgressRecord::capture(document, self.fingerprint.clone());
        let json = serde_json::to_string_pretty(&record)
            .context("Failed to serialize progress record")?;

        FileManager::write_atomically(&self.path, json.as_bytes())
            .with_context(|| format!("Failed to save progress to {}", self.path.display()))?;

        debug!("Saved progress: {}/{} chapters processed", record.processed_items.len(), document.len());
        Ok(())
    }

    /// Read the progress record, if there is one
    pub fn read(&self) -> Result<Option<ProgressRecord>> {
        if !self.exists() {
            return Ok(None);
        }

        let json = FileManager::read_to_string(&self.path)?;
        let record = serde_json::from_str(&json)
            .with_context(|| format!(
                "Progress file {} is corrupt; delete it to start over",
                self.path.display()
            ))?;
        Ok(Some(record))
    }

    /// Apply saved progress to `document`
    ///
    /// Saved markup replaces chapter content and processed chapters are
    /// marked as such. Ids unknown to the document are dropped.
    pub fn load(&self, document: &mut Document) -> Result<ResumeResult> {
        let Some(record) = self.read()? else {
            return Ok(ResumeResult::NotFound);
        };

        if !record.matches_source(self.fingerprint.as_deref()) {
            let old_hash = record.source_fingerprint.unwrap_or_default();
            let new_hash = self.fingerprint.clone().unwrap_or_default();
            warn!(
                "Ignoring progress in {}: it was made from a different source file (old: {}, new: {})",
                self.path.display(),
                short_hash(&old_hash),
                short_hash(&new_hash)
            );
            return Ok(ResumeResult::SourceFileChanged { old_hash, new_hash });
        }

        for (id, content) in &record.book_content {
            if let Some(chapter) = document.chapter_mut(id) {
                chapter.content = content.clone();
            }
        }

        let mut processed = HashSet::new();
        let mut dropped = Vec::new();
        for id in record.processed_items {
            match document.chapter_mut(&id) {
                Some(chapter) => {
                    chapter.processed = true;
                    processed.insert(id);
                }
                None => dropped.push(id),
            }
        }

        if !dropped.is_empty() {
            warn!("Dropping {} unknown chapter id(s) from progress: {}", dropped.len(), dropped.join(", "));
        }
        info!("Resuming: {}/{} chapters already processed", processed.len(), document.len());

        Ok(ResumeResult::Resumed { processed, dropped })
    }

    /// Remove the progress file, returning whether one existed
    pub fn clear(&self) -> Result<bool> {
        let removed = FileManager::remove_if_exists(&self.path)?;
        if removed {
            debug!("Removed progress file {}", self.path.display());
        }
        Ok(removed)
    }
}

fn short_hash(hash: &str) -> &str {
    hash.get(..8).unwrap_or(hash)
}

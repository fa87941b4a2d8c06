/*!
 * Persisted progress models.
 */

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::document::Document;

/// On-disk record of an interrupted run
///
/// `book_content` holds the current markup of every chapter, keyed by
/// chapter id, so a resumed run can restore annotated chapters exactly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// SHA-256 of the source container; absent in records from older versions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_fingerprint: Option<String>,

    /// RFC 3339 time of the last save
    #[serde(default)]
    pub updated_at: String,

    /// Ids of chapters that are fully annotated
    #[serde(default)]
    pub processed_items: Vec<String>,

    /// Chapter markup keyed by chapter id
    #[serde(default)]
    pub book_content: BTreeMap<String, String>,
}

impl ProgressRecord {
    /// Snapshot the current state of `document`
    pub fn capture(document: &Document, source_fingerprint: Option<String>) -> Self {
        Self {
            source_fingerprint,
            updated_at: Local::now().to_rfc3339(),
            processed_items: document.processed_ids(),
            book_content: document.chapters().iter()
                .map(|c| (c.id.clone(), c.content.clone()))
                .collect(),
        }
    }

    /// Whether the record was made from the container with `fingerprint`
    pub fn matches_source(&self, fingerprint: Option<&str>) -> bool {
        match (self.source_fingerprint.as_deref(), fingerprint) {
            (Some(recorded), Some(current)) => recorded == current,
            _ => true,
        }
    }
}

/// Outcome of loading a progress file
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeResult {
    /// No progress file, the run starts from scratch
    NotFound,
    /// Progress was applied to the document
    Resumed {
        /// Chapters restored as processed
        processed: HashSet<String>,
        /// Ids in the record that the document does not contain
        dropped: Vec<String>,
    },
    /// The record belongs to a different source container and was ignored
    SourceFileChanged {
        /// Fingerprint stored in the record
        old_hash: String,
        /// Fingerprint of the current container
        new_hash: String,
    },
}

impl ResumeResult {
    /// Chapters already processed; empty unless progress was resumed
    pub fn processed_ids(&self) -> HashSet<String> {
        match self {
            Self::Resumed { processed, .. } => processed.clone(),
            _ => HashSet::new(),
        }
    }

    /// Whether progress from an earlier run was applied
    pub fn is_resumed(&self) -> bool {
        matches!(self, Self::Resumed { .. })
    }
}

/*!
 * Progress persistence for interrupted runs.
 *
 * This module provides:
 * - The on-disk progress record
 * - Saving and restoring chapter-level progress
 */

pub mod manager;
pub mod models;

// Re-export main types
pub use manager::ProgressStore;
pub use models::{ProgressRecord, ResumeResult};

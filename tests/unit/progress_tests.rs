/*!
 * Tests for the progress file format and resume decisions
 */

use anyhow::Result;
use std::fs;

use epub_gloss::document::{Chapter, Document};
use epub_gloss::session::{ProgressRecord, ProgressStore, ResumeResult};
use crate::common;

fn document() -> Result<Document> {
    Ok(Document::new(vec![
        Chapter::new("ch1", "OEBPS/ch1.xhtml", "<p>one</p>"),
        Chapter::new("ch2", "OEBPS/ch2.xhtml", "<p>two</p>"),
        Chapter::new("ch3", "OEBPS/ch3.xhtml", "<p>three</p>"),
    ])?)
}

#[test]
fn test_save_shouldWriteExpectedJsonShape() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let store = ProgressStore::new(temp_dir.path().join("progress.json")).with_fingerprint("abc123");
    let mut doc = document()?;
    let chapter = doc.chapter_mut("ch2").unwrap();
    chapter.content = "<p><ruby>two<rt>二</rt></ruby></p>".to_string();
    chapter.processed = true;

    store.save(&doc)?;

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(store.path())?)?;
    assert_eq!(json["processed_items"], serde_json::json!(["ch2"]));
    assert_eq!(json["book_content"]["ch1"], "<p>one</p>");
    assert_eq!(json["book_content"]["ch2"], "<p><ruby>two<rt>二</rt></ruby></p>");
    assert_eq!(json["source_fingerprint"], "abc123");
    assert!(chrono::DateTime::parse_from_rfc3339(json["updated_at"].as_str().unwrap()).is_ok());
    Ok(())
}

#[test]
fn test_load_withLegacyRecord_shouldResume() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(
        temp_dir.path(),
        "progress.json",
        r#"{"processed_items": ["ch1"], "book_content": {"ch1": "<p>done</p>"}}"#,
    )?;
    let store = ProgressStore::new(path).with_fingerprint("anything");
    let mut doc = document()?;

    let result = store.load(&mut doc)?;

    assert!(result.is_resumed());
    assert_eq!(doc.processed_ids(), vec!["ch1".to_string()]);
    assert_eq!(doc.chapter("ch1").unwrap().content, "<p>done</p>");
    assert_eq!(doc.pending_count(), 2);
    Ok(())
}

#[test]
fn test_load_withChangedSource_shouldLeaveDocumentUntouched() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("progress.json");
    let mut saved = document()?;
    saved.chapter_mut("ch1").unwrap().processed = true;
    ProgressStore::new(&path).with_fingerprint("old").save(&saved)?;

    let mut doc = document()?;
    let result = ProgressStore::new(&path).with_fingerprint("new").load(&mut doc)?;

    assert_eq!(result, ResumeResult::SourceFileChanged {
        old_hash: "old".to_string(),
        new_hash: "new".to_string(),
    });
    assert!(result.processed_ids().is_empty());
    assert_eq!(doc.pending_count(), 3);
    Ok(())
}

#[test]
fn test_load_withEmptyProcessedList_shouldResumeNothing() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let store = ProgressStore::new(temp_dir.path().join("progress.json"));
    store.save(&document()?)?;

    let mut doc = document()?;
    let result = store.load(&mut doc)?;

    assert!(result.is_resumed());
    assert!(result.processed_ids().is_empty());
    assert_eq!(doc.pending_count(), 3);
    Ok(())
}

#[test]
fn test_progressRecord_capture_shouldFollowDocumentOrder() -> Result<()> {
    let mut doc = document()?;
    doc.chapter_mut("ch3").unwrap().processed = true;
    doc.chapter_mut("ch1").unwrap().processed = true;

    let record = ProgressRecord::capture(&doc, None);

    assert_eq!(record.processed_items, vec!["ch1".to_string(), "ch3".to_string()]);
    assert_eq!(record.book_content.len(), 3);
    assert!(record.source_fingerprint.is_none());
    Ok(())
}

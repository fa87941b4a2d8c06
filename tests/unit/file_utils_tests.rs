/*!
 * Tests for file utility functions
 */

use anyhow::Result;
use std::fs;

use epub_gloss::file_utils::FileManager;
use crate::common;

/// Test that file_exists returns true for existing files
#[test]
fn test_file_exists_withExistingFile_shouldReturnTrue() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let test_file = common::create_test_file(temp_dir.path(), "exists.tmp", "test content")?;

    assert!(FileManager::file_exists(&test_file));
    assert!(!FileManager::file_exists(temp_dir.path()));
    Ok(())
}

/// Test that file_exists returns false for non-existent files
#[test]
fn test_file_exists_withNonExistentFile_shouldReturnFalse() {
    assert!(!FileManager::file_exists("non_existent_file.tmp"));
}

#[test]
fn test_loadWordList_shouldLowercaseTrimAndSkipBlanks() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "vocabulary.txt", "The\n  a  \n\n\tOcean\r\n")?;

    let words = FileManager::load_word_list(&path)?;

    assert_eq!(words.len(), 3);
    assert!(words.contains("the"));
    assert!(words.contains("a"));
    assert!(words.contains("ocean"));
    Ok(())
}

#[test]
fn test_loadWordList_withMissingFile_shouldReturnEmptySet() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let words = FileManager::load_word_list(temp_dir.path().join("missing.txt"))?;
    assert!(words.is_empty());
    Ok(())
}

#[test]
fn test_writeAtomically_shouldReplaceContentAndLeaveNoTempFiles() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("nested").join("progress.json");

    FileManager::write_atomically(&path, b"first")?;
    FileManager::write_atomically(&path, b"second")?;

    assert_eq!(fs::read_to_string(&path)?, "second");
    let entries = fs::read_dir(path.parent().unwrap())?.count();
    assert_eq!(entries, 1);
    Ok(())
}

#[test]
fn test_removeIfExists_shouldReportWhetherFileExisted() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "gone.txt", "x")?;

    assert!(FileManager::remove_if_exists(&path)?);
    assert!(!FileManager::remove_if_exists(&path)?);
    Ok(())
}

#[test]
fn test_fingerprint_shouldBeStableAndContentSensitive() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let a = common::create_test_file(temp_dir.path(), "a.bin", "abc")?;
    let b = common::create_test_file(temp_dir.path(), "b.bin", "abc")?;
    let c = common::create_test_file(temp_dir.path(), "c.bin", "abd")?;

    let fingerprint = FileManager::fingerprint(&a)?;
    assert_eq!(fingerprint, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
    assert_eq!(fingerprint, FileManager::fingerprint(&b)?);
    assert_ne!(fingerprint, FileManager::fingerprint(&c)?);
    Ok(())
}

/*!
 * Common test utilities for the epub-gloss test suite
 */

use anyhow::Result;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use epub_gloss::app_config::{Config, ProviderKind};
use epub_gloss::providers::ChatRequest;

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Wraps body markup into a minimal XHTML chapter
pub fn chapter_xhtml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>Chapter</title></head>
<body>
{}
</body>
</html>"#,
        body
    )
}

/// Chapter definition for `build_epub`: (manifest id, path under OEBPS/, markup)
pub type ChapterEntry<'a> = (&'a str, &'a str, &'a str);

/// Builds an EPUB archive in memory
///
/// Besides the chapters, the archive carries a stylesheet and an image so
/// tests can check that non-chapter entries survive unchanged.
pub fn build_epub(chapters: &[ChapterEntry]) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    writer.start_file("mimetype", stored)?;
    writer.write_all(b"application/epub+zip")?;

    writer.start_file("META-INF/container.xml", deflated)?;
    writer.write_all(br#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#)?;

    let mut manifest = String::from(
        "    <item id=\"css\" href=\"style.css\" media-type=\"text/css\"/>\n    <item id=\"cover\" href=\"cover.png\" media-type=\"image/png\"/>\n",
    );
    let mut spine = String::new();
    for (id, href, _) in chapters {
        manifest.push_str(&format!("    <item id=\"{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n", id, href));
        spine.push_str(&format!("    <itemref idref=\"{}\"/>\n", id));
    }

    let package = format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="id">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>Test Book</dc:title>
    <dc:language>en</dc:language>
  </metadata>
  <manifest>
{}  </manifest>
  <spine>
{}  </spine>
</package>"#,
        manifest, spine
    );
    writer.start_file("OEBPS/content.opf", deflated)?;
    writer.write_all(package.as_bytes())?;

    writer.start_file("OEBPS/style.css", deflated)?;
    writer.write_all(b"p { margin: 0; }")?;

    writer.start_file("OEBPS/cover.png", stored)?;
    writer.write_all(&[0x89, b'P', b'N', b'G', 0, 1, 2, 3])?;

    for (_, href, content) in chapters {
        writer.start_file(format!("OEBPS/{}", href), deflated)?;
        writer.write_all(content.as_bytes())?;
    }

    Ok(writer.finish()?.into_inner())
}

/// Writes an EPUB built by `build_epub` into `dir`
pub fn write_epub(dir: &Path, filename: &str, chapters: &[ChapterEntry]) -> Result<PathBuf> {
    let path = dir.join(filename);
    fs::write(&path, build_epub(chapters)?)?;
    Ok(path)
}

/// Configuration that keeps all files inside `dir` and never sleeps
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.provider.provider = ProviderKind::Ollama;
    config.provider.active_provider_config_mut().rate_limit = None;
    config.retry.max_attempts = 3;
    config.retry.min_backoff_ms = 0;
    config.retry.max_backoff_ms = 0;
    config.vocabulary_path = dir.join("vocabulary.txt").to_string_lossy().to_string();
    config.progress_path = dir.join("progress.json").to_string_lossy().to_string();
    config
}

/// Glosses known to `dictionary_responder`
pub const DICTIONARY: &[(&str, &str)] = &[
    ("vessel", "船"),
    ("ocean", "海洋"),
    ("harbor", "港口"),
];

/// Answers extraction and translation requests from `DICTIONARY`
///
/// Extraction replies list every dictionary word found in the passage;
/// translation replies are JSON arrays covering the requested words.
pub fn dictionary_responder(request: &ChatRequest) -> String {
    let prompt = request.user_prompt().unwrap_or_default();
    let is_translation = request.system_prompt()
        .map(|system| system.contains("translator"))
        .unwrap_or(false);

    if is_translation {
        let words = prompt.rsplit("Words:\n").next().unwrap_or_default();
        let pairs: Vec<serde_json::Value> = words.lines()
            .filter_map(|word| {
                DICTIONARY.iter()
                    .find(|(entry, _)| entry.eq_ignore_ascii_case(word.trim()))
                    .map(|(_, gloss)| serde_json::json!({"word": word.trim(), "translation": gloss}))
            })
            .collect();
        serde_json::Value::Array(pairs).to_string()
    } else {
        let passage = prompt.rsplit("Passage:\n").next().unwrap_or_default().to_lowercase();
        DICTIONARY.iter()
            .filter(|(entry, _)| passage.contains(entry))
            .map(|(entry, _)| *entry)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/*!
 * EPUB container reading and writing.
 *
 * The whole archive is loaded into memory. Chapters are the manifest items
 * with media type `application/xhtml+xml`, located through
 * `META-INF/container.xml` and the OPF package document. Writing produces a
 * new archive with `mimetype` stored first, chapter payloads replaced and
 * every other entry copied unchanged.
 */

use log::{debug, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use url::Url;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::errors::DocumentError;
use super::model::{Chapter, Document};

const CONTAINER_PATH: &str = "META-INF/container.xml";
const MIMETYPE_PATH: &str = "mimetype";
const XHTML_MEDIA_TYPE: &str = "application/xhtml+xml";

/// Base used to resolve manifest hrefs against the package path
const ARCHIVE_ROOT: &str = "http://epub.invalid/";

/// One archive member held in memory
#[derive(Debug, Clone)]
struct ArchiveEntry {
    name: String,
    data: Vec<u8>,
    is_dir: bool,
}

/// A manifest item of the package document
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestItem {
    /// Item id
    pub id: String,
    /// Archive entry name the href resolves to
    pub path: String,
    /// Declared media type
    pub media_type: String,
}

/// An EPUB archive loaded into memory
#[derive(Debug, Clone)]
pub struct EpubContainer {
    entries: Vec<ArchiveEntry>,
    package_path: String,
    manifest: Vec<ManifestItem>,
}

impl EpubContainer {
    /// Read an EPUB file
    pub fn open(path: &Path) -> Result<Self, DocumentError> {
        let bytes = fs::read(path)?;
        debug!("Read {} bytes from {:?}", bytes.len(), path);
        Self::from_bytes(bytes)
    }

    /// Load an EPUB from its bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, DocumentError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.push(ArchiveEntry {
                name: file.name().to_string(),
                data,
                is_dir: file.is_dir(),
            });
        }

        let container_xml = text_entry(&entries, CONTAINER_PATH)?;
        let package_path = find_package_path(container_xml)?;
        let package_xml = text_entry(&entries, &package_path)?;
        let manifest = parse_manifest(package_xml, &package_path)?;

        Ok(Self { entries, package_path, manifest })
    }

    /// Archive path of the OPF package document
    pub fn package_path(&self) -> &str {
        &self.package_path
    }

    /// All manifest items in declaration order
    pub fn manifest(&self) -> &[ManifestItem] {
        &self.manifest
    }

    /// Build the in-memory document from the XHTML manifest items
    pub fn read_document(&self) -> Result<Document, DocumentError> {
        let index = self.entry_index();
        let mut chapters = Vec::new();

        for item in self.manifest.iter().filter(|item| item.media_type == XHTML_MEDIA_TYPE) {
            let entry = index.get(&entry_key(&item.path))
                .map(|&i| &self.entries[i])
                .ok_or_else(|| DocumentError::MissingEntry(item.path.clone()))?;
            let content = String::from_utf8(entry.data.clone())
                .map_err(|_| DocumentError::Encoding(item.id.clone()))?;
            chapters.push(Chapter::new(&item.id, &entry.name, content));
        }

        debug!("Found {} chapter(s) in {}", chapters.len(), self.package_path);
        Document::new(chapters)
    }

    /// Serialize the archive with chapter payloads taken from `document`
    pub fn to_bytes(&self, document: &Document) -> Result<Vec<u8>, DocumentError> {
        let chapters: HashMap<&str, &str> = document.chapters().iter()
            .map(|c| (c.href.as_str(), c.content.as_str()))
            .collect();

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        // The mimetype entry must come first and be stored uncompressed
        let mimetype = self.entries.iter()
            .find(|e| e.name == MIMETYPE_PATH)
            .map(|e| e.data.as_slice())
            .unwrap_or(&b"application/epub+zip"[..]);
        writer.start_file(MIMETYPE_PATH, file_options(CompressionMethod::Stored))?;
        writer.write_all(mimetype)?;

        for entry in self.entries.iter().filter(|e| e.name != MIMETYPE_PATH) {
            if entry.is_dir {
                writer.add_directory(entry.name.as_str(), file_options(CompressionMethod::Deflated))?;
                continue;
            }

            writer.start_file(entry.name.as_str(), file_options(CompressionMethod::Deflated))?;
            match chapters.get(entry.name.as_str()) {
                Some(content) => writer.write_all(content.as_bytes())?,
                None => writer.write_all(&entry.data)?,
            }
        }

        let cursor = writer.finish()?;
        Ok(cursor.into_inner())
    }

    /// Write the archive with chapter payloads taken from `document`
    pub fn save(&self, document: &Document, path: &Path) -> Result<(), DocumentError> {
        let bytes = self.to_bytes(document)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    fn entry_index(&self) -> HashMap<String, usize> {
        self.entries.iter()
            .enumerate()
            .filter(|(_, e)| !e.is_dir)
            .map(|(i, e)| (entry_key(&e.name), i))
            .collect()
    }
}

fn file_options(method: CompressionMethod) -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(method)
}

/// Find a text entry by name
fn text_entry<'a>(entries: &'a [ArchiveEntry], name: &str) -> Result<&'a str, DocumentError> {
    let key = entry_key(name);
    let entry = entries.iter()
        .find(|e| !e.is_dir && entry_key(&e.name) == key)
        .ok_or_else(|| DocumentError::MissingEntry(name.to_string()))?;
    std::str::from_utf8(&entry.data).map_err(|_| DocumentError::Encoding(name.to_string()))
}

/// Resolve `href` relative to the archive path `base`
///
/// The result is in percent-encoded form, so the same function is used to
/// key archive entry names for lookups.
fn resolve_href(base: &str, href: &str) -> Option<String> {
    let root = Url::parse(ARCHIVE_ROOT).ok()?;
    let resolved = root.join(base).ok()?.join(href).ok()?;
    Some(resolved.path().trim_start_matches('/').to_string())
}

fn entry_key(name: &str) -> String {
    resolve_href("", name).unwrap_or_else(|| name.to_string())
}

/// Value of the attribute whose local name is `key`
fn attribute(element: &BytesStart, key: &[u8]) -> Option<String> {
    element.attributes()
        .with_checks(false)
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == key)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

fn markup_error(location: &str, error: impl ToString) -> DocumentError {
    DocumentError::Markup {
        location: location.to_string(),
        message: error.to_string(),
    }
}

/// Read the package document path from `META-INF/container.xml`
fn find_package_path(container_xml: &str) -> Result<String, DocumentError> {
    let mut reader = Reader::from_str(container_xml);

    loop {
        match reader.read_event().map_err(|e| markup_error(CONTAINER_PATH, e))? {
            Event::Start(element) | Event::Empty(element)
                if element.local_name().as_ref() == b"rootfile" =>
            {
                if let Some(path) = attribute(&element, b"full-path") {
                    return Ok(path);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Err(markup_error(CONTAINER_PATH, "no rootfile with a full-path attribute"))
}

/// List the manifest items of a package document
fn parse_manifest(package_xml: &str, package_path: &str) -> Result<Vec<ManifestItem>, DocumentError> {
    let mut reader = Reader::from_str(package_xml);
    let mut items = Vec::new();
    let mut in_manifest = false;

    loop {
        match reader.read_event().map_err(|e| markup_error(package_path, e))? {
            Event::Start(element) if element.local_name().as_ref() == b"manifest" => in_manifest = true,
            Event::End(element) if element.local_name().as_ref() == b"manifest" => in_manifest = false,
            Event::Start(element) | Event::Empty(element)
                if in_manifest && element.local_name().as_ref() == b"item" =>
            {
                let (Some(id), Some(href)) = (attribute(&element, b"id"), attribute(&element, b"href")) else {
                    warn!("Skipping manifest item without id or href in {}", package_path);
                    continue;
                };
                let path = resolve_href(package_path, &href).unwrap_or(href);
                let media_type = attribute(&element, b"media-type").unwrap_or_default();
                items.push(ManifestItem { id, path, media_type });
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(items)
}

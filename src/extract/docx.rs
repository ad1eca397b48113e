//! DOCX extractor: paragraphs from every document part, then comments,
//! then core properties.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::debug;
use quick_xml::Reader;
use quick_xml::events::Event;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::ExtractError;
use crate::extract::{
    ChunkStream, FileHandler, Handles, TextEvent, chunk_events, empty_stream, log_read_error,
};

pub struct DocxHandler;

const LOG_TARGET: &str = "docx";

impl FileHandler for DocxHandler {
    fn name(&self) -> &'static str {
        "docx"
    }

    fn handles(&self) -> Handles {
        Handles {
            exts: &[".docx"],
            mimes: &["application/vnd.openxmlformats-officedocument.wordprocessingml.document"],
        }
    }

    fn read_file(&self, path: &Path, max_content_size: usize) -> ChunkStream {
        let filename = path.display().to_string();
        let document = match DocxDocument::open(path) {
            Ok(doc) => doc,
            Err(e) => {
                log_read_error(LOG_TARGET, &filename, &e);
                return empty_stream();
            }
        };
        debug!(
            target: LOG_TARGET,
            "{filename}: {} paragraphs, {} comments",
            document.paragraphs.len(),
            document.comments.len(),
        );
        chunk_events(Box::new(document.into_events()), max_content_size)
    }
}

/// The textual parts of one document, in extraction order.
struct DocxDocument {
    paragraphs: Vec<String>,
    comments: Vec<String>,
    properties: Vec<String>,
}

impl DocxDocument {
    fn open(path: &Path) -> Result<Self, ExtractError> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(file).map_err(zip_error)?;

        // Header, body, footer. Headers and footers are numbered parts.
        let mut part_names: Vec<String> = Vec::new();
        let mut headers: Vec<String> = Vec::new();
        let mut footers: Vec<String> = Vec::new();
        for name in archive.file_names() {
            if name.starts_with("word/header") && name.ends_with(".xml") {
                headers.push(name.to_owned());
            } else if name.starts_with("word/footer") && name.ends_with(".xml") {
                footers.push(name.to_owned());
            }
        }
        headers.sort();
        footers.sort();
        part_names.extend(headers);
        part_names.push("word/document.xml".to_owned());
        part_names.extend(footers);

        let mut paragraphs = Vec::new();
        for part in part_names {
            if let Some(bytes) = read_entry(&mut archive, &part)? {
                paragraphs.extend(parse_paragraphs(&bytes)?);
            }
        }

        let comments = match read_entry(&mut archive, "word/comments.xml")? {
            Some(bytes) => parse_comments(&bytes)?,
            None => Vec::new(),
        };

        let properties = match read_entry(&mut archive, "docProps/core.xml")? {
            Some(bytes) => parse_core_properties(&bytes)?,
            None => Vec::new(),
        };

        Ok(Self {
            paragraphs,
            comments,
            properties,
        })
    }

    /// Paragraph and comment lines, with the serialized properties riding
    /// on the tail of the buffer (no flush before them).
    fn into_events(self) -> impl Iterator<Item = TextEvent> + Send {
        let properties_line = self.properties.join(" ");
        self.paragraphs
            .into_iter()
            .chain(self.comments)
            .chain((!properties_line.is_empty()).then_some(properties_line))
            .map(TextEvent::Line)
    }
}

fn zip_error(e: ZipError) -> ExtractError {
    match e {
        ZipError::Io(io) => io.into(),
        other => ExtractError::Corrupt(other.to_string()),
    }
}

fn xml_error<E: std::fmt::Display>(e: E) -> ExtractError {
    ExtractError::Corrupt(e.to_string())
}

fn read_entry(
    archive: &mut ZipArchive<File>,
    name: &str,
) -> Result<Option<Vec<u8>>, ExtractError> {
    match archive.by_name(name) {
        Ok(mut entry) => {
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes).map_err(ExtractError::from)?;
            Ok(Some(bytes))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(zip_error(e)),
    }
}

/// Every `w:p` in the part becomes one line; runs inside table cells are
/// paragraphs too, so tables come along for free.
fn parse_paragraphs(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    collect_grouped_text(bytes, b"p")
}

/// Every `w:comment` body becomes one line.
fn parse_comments(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    collect_grouped_text(bytes, b"comment")
}

/// Collect the `w:t` text inside each `group` element.
fn collect_grouped_text(bytes: &[u8], group: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) => {
                let local = e.local_name();
                if local.as_ref() == group {
                    depth += 1;
                    if depth == 1 {
                        current.clear();
                    }
                } else if depth > 0 && local.as_ref() == b"t" {
                    in_text = true;
                }
            }
            Event::Text(t) if in_text => {
                current.push_str(&t.unescape().map_err(xml_error)?);
            }
            Event::End(e) => {
                let local = e.local_name();
                if local.as_ref() == group {
                    depth = depth.saturating_sub(1);
                    if depth == 0 && !current.trim().is_empty() {
                        lines.push(std::mem::take(&mut current));
                    }
                } else if local.as_ref() == b"t" {
                    in_text = false;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(lines)
}

/// `docProps/core.xml` as `name: value` pairs.
fn parse_core_properties(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut properties = Vec::new();
    let mut element: Option<String> = None;
    let mut value = String::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if local != "coreProperties" {
                    element = Some(local);
                    value.clear();
                }
            }
            Event::Text(t) if element.is_some() => {
                value.push_str(&t.unescape().map_err(xml_error)?);
            }
            Event::End(_) => {
                if let Some(name) = element.take() {
                    if !value.trim().is_empty() {
                        properties.push(format!("{name}: {}", value.trim()));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(properties)
}

//! PDF extractor.
//!
//! PDF is optimized for printing, not text extraction; this is a
//! best-effort pass over the page text, with document-info values
//! appended after the pages.

use std::path::Path;

use log::debug;

use crate::error::ExtractError;
use crate::extract::{
    ChunkStream, FileHandler, Handles, TextEvent, chunk_events, empty_stream, log_read_error,
};

pub struct PdfHandler;

const LOG_TARGET: &str = "pdf";

impl FileHandler for PdfHandler {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn handles(&self) -> Handles {
        Handles {
            exts: &[".pdf"],
            mimes: &["application/pdf"],
        }
    }

    fn read_file(&self, path: &Path, max_content_size: usize) -> ChunkStream {
        let filename = path.display().to_string();
        match PdfSource::open(path) {
            Ok(source) => {
                debug!(target: LOG_TARGET, "{filename}: extracted {} bytes of page text",
                       source.page_text.len());
                chunk_events(Box::new(source.into_events()), max_content_size)
            }
            Err(e) => {
                log_read_error(LOG_TARGET, &filename, &e);
                empty_stream()
            }
        }
    }
}

/// Extracted page text plus whatever document-info values the reader
/// exposes. The extraction library is the collaborator behind this seam;
/// `pdf-extract` reports page text only, so `metadata` is empty for the
/// built-in opener.
pub(crate) struct PdfSource {
    page_text: String,
    metadata: Vec<String>,
}

impl PdfSource {
    fn open(path: &Path) -> Result<Self, ExtractError> {
        // The file may have vanished or be unreadable for ordinary I/O
        // reasons; distinguish those from parse failures.
        std::fs::metadata(path).map_err(ExtractError::from)?;
        let page_text = pdf_extract::extract_text(path)
            .map_err(|e| ExtractError::Corrupt(e.to_string()))?;
        Ok(Self {
            page_text,
            metadata: Vec::new(),
        })
    }

    #[cfg(test)]
    fn from_parts(page_text: String, metadata: Vec<String>) -> Self {
        Self {
            page_text,
            metadata,
        }
    }

    fn into_events(self) -> impl Iterator<Item = TextEvent> + Send {
        let lines: Vec<String> = self
            .page_text
            .split('\n')
            .filter(|line| !line.trim().is_empty())
            .map(str::to_owned)
            .collect();
        lines
            .into_iter()
            .chain(self.metadata)
            .map(TextEvent::Line)
    }
}

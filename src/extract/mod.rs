/*!
Format extractors.

Every extractor turns one file into a lazy, bounded-memory stream of
whitespace-normalized text chunks. Extractors produce a stream of
[`TextEvent`]s (one per logical line, plus explicit flush points); the
shared [`ChunkedEvents`] adapter shapes those events into chunks through a
[`ChunkBuffer`], flushing whenever the buffer fills and finalizing the
remainder at end of input.
*/

pub mod chunk;
pub mod docx;
pub mod encoding;
pub mod pdf;
pub mod plaintext;
pub mod sheet;
pub mod xls;
pub mod xlsx;

use std::path::Path;

use crate::extract::chunk::ChunkBuffer;

/// Registry metadata: the extensions and MIME types an extractor claims.
#[derive(Debug, Clone, Copy)]
pub struct Handles {
    pub exts: &'static [&'static str],
    pub mimes: &'static [&'static str],
}

/// One unit of extracted text on its way to the chunker.
#[derive(Debug, Clone, PartialEq)]
pub enum TextEvent {
    /// A logical line of text (paragraph, spreadsheet row, PDF line, ...).
    Line(String),
    /// Flush the remainder of the current buffer (e.g. between worksheets).
    Flush,
}

pub type EventStream = Box<dyn Iterator<Item = TextEvent> + Send>;
pub type ChunkStream = Box<dyn Iterator<Item = String> + Send>;

/// A format-specific extractor.
pub trait FileHandler: Sync {
    fn name(&self) -> &'static str;

    fn handles(&self) -> Handles;

    /// Stream the file's text as chunks of at most `max_content_size`
    /// bytes (plus at most one word). Open and parse failures are logged
    /// and produce an empty stream.
    fn read_file(&self, path: &Path, max_content_size: usize) -> ChunkStream;
}

/// Adapter from text events to bounded chunks.
struct ChunkedEvents<I> {
    events: I,
    buffer: ChunkBuffer,
    done: bool,
}

impl<I: Iterator<Item = TextEvent>> Iterator for ChunkedEvents<I> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.done {
            return None;
        }
        loop {
            match self.events.next() {
                Some(TextEvent::Line(line)) => {
                    self.buffer.append(&line);
                    if self.buffer.is_full() {
                        return Some(self.buffer.drain());
                    }
                }
                Some(TextEvent::Flush) => {
                    let rest = self.buffer.finalize();
                    if !rest.is_empty() {
                        return Some(rest);
                    }
                }
                None => {
                    self.done = true;
                    let rest = self.buffer.finalize();
                    if rest.is_empty() {
                        return None;
                    }
                    return Some(rest);
                }
            }
        }
    }
}

/// Shape an event stream into a chunk stream.
#[must_use]
pub fn chunk_events(events: EventStream, max_content_size: usize) -> ChunkStream {
    Box::new(ChunkedEvents {
        events,
        buffer: ChunkBuffer::new(max_content_size),
        done: false,
    })
}

/// The stream for a file that could not be read.
#[must_use]
pub fn empty_stream() -> ChunkStream {
    Box::new(std::iter::empty())
}

/// Common log policy for extractor failures: every kind maps to a log line
/// and the file is skipped.
pub(crate) fn log_read_error(target: &str, filename: &str, err: &crate::error::ExtractError) {
    use crate::error::ExtractError;
    use log::error;

    match err {
        ExtractError::NotFound => {
            error!(target: target, "Previously discovered file no longer exists: {filename}. File skipped");
        }
        ExtractError::PermissionDenied => {
            error!(target: target, "PermissionError reading {filename}. File skipped");
        }
        ExtractError::Corrupt(msg) => {
            error!(target: target, "{filename}: {msg}. File skipped");
        }
        ExtractError::Unsupported => {
            error!(target: target, "{filename}: unsupported legacy format. File skipped");
        }
        ExtractError::Io(e) => {
            error!(target: target, "OSError reading {filename}. File skipped. Error message: {e}");
        }
    }
}

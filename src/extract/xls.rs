//! Legacy Excel (BIFF) extractor.
//!
//! The binary workbook parser is an external collaborator: this module
//! owns the registry claims, the streaming behavior and the error policy,
//! and hands any sheets it obtains to the shared worksheet engine. The
//! built-in opener recognizes the compound-file container but has no BIFF
//! reader to delegate to, so legacy workbooks are logged and skipped.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::ExtractError;
use crate::extract::sheet::{Sheet, sheet_events};
use crate::extract::{ChunkStream, FileHandler, Handles, chunk_events, empty_stream, log_read_error};

pub struct XlsHandler;

const LOG_TARGET: &str = "xls";

/// Compound File Binary magic, the container of every `.xls` workbook.
const CFB_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

impl FileHandler for XlsHandler {
    fn name(&self) -> &'static str {
        "xls"
    }

    fn handles(&self) -> Handles {
        Handles {
            exts: &[".xls"],
            mimes: &["application/vnd.ms-excel", "application/excel"],
        }
    }

    fn read_file(&self, path: &Path, max_content_size: usize) -> ChunkStream {
        let filename = path.display().to_string();
        match open_workbook(path) {
            Ok(sheets) => chunk_events(
                Box::new(sheet_events(filename, sheets)),
                max_content_size,
            ),
            Err(e) => {
                log_read_error(LOG_TARGET, &filename, &e);
                empty_stream()
            }
        }
    }
}

/// The workbook seam. A real BIFF reader plugs in here; without one,
/// structurally valid workbooks are unsupported and anything else is
/// corrupt.
fn open_workbook(path: &Path) -> Result<Vec<Sheet>, ExtractError> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; 8];
    file.read_exact(&mut magic)
        .map_err(|_| ExtractError::Corrupt("truncated workbook".to_owned()))?;
    if magic == CFB_MAGIC {
        Err(ExtractError::Unsupported)
    } else {
        Err(ExtractError::Corrupt("not a compound-file workbook".to_owned()))
    }
}

/// Stream pre-parsed sheets, for callers that bring their own workbook
/// reader.
#[must_use]
pub fn sheets_to_chunks(filename: String, sheets: Vec<Sheet>, max_content_size: usize) -> ChunkStream {
    chunk_events(Box::new(sheet_events(filename, sheets)), max_content_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::sheet::Cell;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn legacy_workbook_is_skipped() {
        let mut file = NamedTempFile::with_suffix(".xls").expect("temp file");
        file.write_all(&CFB_MAGIC).expect("write magic");
        file.write_all(&[0u8; 64]).expect("write body");
        let stream = XlsHandler.read_file(file.path(), 650);
        assert_eq!(stream.count(), 0);
    }

    #[test]
    fn garbage_is_reported_corrupt_and_skipped() {
        let mut file = NamedTempFile::with_suffix(".xls").expect("temp file");
        file.write_all(b"definitely not a workbook").expect("write");
        let stream = XlsHandler.read_file(file.path(), 650);
        assert_eq!(stream.count(), 0);
    }

    #[test]
    fn supplied_sheets_stream_through_the_engine() {
        let sheets = vec![Sheet {
            name: "Accounts".to_owned(),
            rows: vec![vec![
                Cell::Text("balance".to_owned()),
                Cell::Merged,
                Cell::Number(1200.0),
            ]],
        }];
        let chunks: Vec<String> = sheets_to_chunks("legacy.xls".to_owned(), sheets, 650).collect();
        assert_eq!(chunks, vec!["balance 1200"]);
    }
}

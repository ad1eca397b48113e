//! Filesystem scanning stages: the directory walker and the file finder.

pub mod dirs;
pub mod files;

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::registry::registry;

/// One admitted file, on its way to an extractor. Built only when a
/// handler resolves for the file's extension or MIME type.
#[derive(Debug, Clone)]
pub struct FileRef {
    pub path: PathBuf,
    /// Lower-cased extension including the leading period; empty when the
    /// file has none.
    pub extension: String,
    pub size: u64,
    pub mime_type: Option<&'static str>,
    pub handler: &'static str,
    pub accessed: Option<SystemTime>,
    pub modified: Option<SystemTime>,
}

impl FileRef {
    /// Resolve `path` against the extractor registry. `None` when no
    /// handler claims the file.
    #[must_use]
    pub fn new(path: PathBuf, meta: &Metadata, mime_type: Option<&'static str>) -> Option<Self> {
        let extension = extension_of(&path);
        let handler = registry().handler_for(&extension, mime_type)?;
        Some(Self {
            extension,
            size: meta.len(),
            mime_type,
            handler,
            accessed: meta.accessed().ok(),
            modified: meta.modified().ok(),
            path,
        })
    }
}

/// The lower-cased `.ext` form used for registry and config lookups.
#[must_use]
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn extension_is_normalized() {
        assert_eq!(extension_of(Path::new("/tmp/A.TXT")), ".txt");
        assert_eq!(extension_of(Path::new("/tmp/noext")), "");
        assert_eq!(extension_of(Path::new("/tmp/archive.tar.gz")), ".gz");
    }

    #[test]
    fn file_ref_resolves_a_handler() {
        let mut file = tempfile::NamedTempFile::with_suffix(".txt").expect("temp file");
        file.write_all(b"hello").expect("write");
        let meta = file.path().metadata().expect("metadata");
        let file_ref =
            FileRef::new(file.path().to_owned(), &meta, Some("text/plain")).expect("resolves");
        assert_eq!(file_ref.handler, "plaintext");
        assert_eq!(file_ref.size, 5);
        assert_eq!(file_ref.extension, ".txt");
    }

    #[test]
    fn unclaimed_files_do_not_build() {
        let mut file = tempfile::NamedTempFile::with_suffix(".exe").expect("temp file");
        file.write_all(b"MZ").expect("write");
        let meta = file.path().metadata().expect("metadata");
        assert!(FileRef::new(file.path().to_owned(), &meta, None).is_none());
    }
}

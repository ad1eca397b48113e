//! Host-platform checks.

use std::path::Path;

/// The key used for per-OS configuration tables.
#[must_use]
pub fn os_key() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        "windows" => "windows",
        _ => "linux",
    }
}

/// Whether a file's content is actually on the local disk.
///
/// OneDrive marks cloud-only files with the recall-on-data-access
/// attribute and Dropbox with the offline attribute; a file is remote when
/// either bit is set. Anywhere outside Windows every file is local. When
/// the attributes cannot be read (commonly: file in use) the file is
/// assumed local.
#[cfg(windows)]
#[must_use]
pub fn is_local_file(path: &Path) -> bool {
    use std::os::windows::fs::MetadataExt;

    const RECALL_ON_DATA_ACCESS: u32 = 0x0040_0000;
    const OFFLINE: u32 = 0x0000_1000;

    match path.metadata() {
        Ok(meta) => {
            let attrs = meta.file_attributes();
            attrs & (RECALL_ON_DATA_ACCESS | OFFLINE) == 0
        }
        Err(_) => true,
    }
}

#[cfg(not(windows))]
#[must_use]
pub fn is_local_file(_path: &Path) -> bool {
    true
}

/// Whether the process runs with elevated rights. Scans from an ordinary
/// account still work, but large parts of the filesystem may be
/// unreadable.
#[cfg(unix)]
#[must_use]
pub fn is_admin() -> bool {
    // SAFETY: geteuid takes no arguments and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
#[must_use]
pub fn is_admin() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_key_is_a_known_table_key() {
        assert!(["windows", "linux", "darwin"].contains(&os_key()));
    }

    #[cfg(not(windows))]
    #[test]
    fn everything_is_local_off_windows() {
        assert!(is_local_file(Path::new("/tmp")));
    }
}

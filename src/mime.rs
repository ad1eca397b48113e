//! MIME detection adapter.
//!
//! Resolution is delegated to `mime_guess`; swapping in a content-sniffing
//! implementation only requires changing this function.

use std::path::Path;

/// Best-guess MIME type for `path`, if any.
#[must_use]
pub fn mime_of(path: &Path) -> Option<&'static str> {
    mime_guess::from_path(path).first_raw()
}

/// Whether MIME detection is available on this build.
#[must_use]
pub fn mime_supported() -> bool {
    true
}

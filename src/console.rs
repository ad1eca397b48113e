//! Terminal output. Status lines, warnings and errors go to stderr so that
//! stdout stays clean for the informational subcommands.

use std::io::Write;

pub fn normal(message: &str) {
    eprintln!("{message}");
}

pub fn warn(message: &str) {
    eprintln!("WARNING: {message}");
}

pub fn error(message: &str) {
    eprintln!("ERROR: {message}");
}

/// Repaint the in-place status line.
pub fn status(line: &str) {
    let mut err = std::io::stderr().lock();
    let _ = write!(err, "\r{line}");
    let _ = err.flush();
}

/// Best-effort terminal width for clamping the status line.
#[must_use]
pub fn width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|cols| cols.parse().ok())
        .unwrap_or(100)
}

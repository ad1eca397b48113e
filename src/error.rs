use std::path::PathBuf;

use thiserror::Error;

/// Process exit codes.
pub mod exit_code {
    pub const OK: i32 = 0;
    pub const UNKNOWN: i32 = 1;
    pub const INVALID_CONFIG: i32 = 2;
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration ({file}): {source}")]
    Parse {
        file: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },

    #[error("could not read configuration file {file}: {source}")]
    Io {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("starting directory does not exist ({0})")]
    MissingStartDir(PathBuf),
}

/// Errors raised while opening or parsing a document inside an extractor.
/// These never escape the pipeline; each maps to a log line and an empty
/// chunk stream.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("file no longer exists")]
    NotFound,

    #[error("permission denied")]
    PermissionDenied,

    #[error("corrupt or unreadable document: {0}")]
    Corrupt(String),

    #[error("unsupported legacy format")]
    Unsupported,

    #[error(transparent)]
    Io(std::io::Error),
}

impl From<std::io::Error> for ExtractError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound,
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            _ => Self::Io(e),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

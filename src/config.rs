/*!
Configuration: a TOML file resolved into concrete, immutable scan
settings. `"all"` placeholder values are substituted with the supported
sets at load time, so the rest of the system only ever sees explicit
lists.
*/

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use log::LevelFilter;
use serde::Deserialize;

use crate::console;
use crate::detect;
use crate::error::ConfigError;
use crate::extract::chunk::{DEFAULT_CHUNK_COUNT, MAX_CHUNK_SIZE};
use crate::logging::parse_level;
use crate::mime::mime_supported;
use crate::platform::os_key;
use crate::registry::registry;

/// The built-in configuration, also written verbatim by `--create-conf`.
pub const DEFAULT_CONFIG_TOML: &str = r#"dataHandlers = ["pan"]

localFilesOnly = true

[results]
path = "piidigger-results/"
json = true
text = true
csv = false

[includeFiles]
ext = "all"
mime = "all"

[includeFiles.startDirs]
windows = "all"
linux = ["/"]
darwin = ["/"]

[excludeDirs]
windows = ['C:\Windows', 'C:\Program Files (x86)', 'C:\Program Files']
linux = ["/boot", "/dev", "/etc", "/proc", "/run", "/snap", "/sys", "/usr/bin", "/usr/lib", "/usr/lib32", "/usr/lib64", "/usr/libx32", "/usr/local", "/usr/sbin", "/usr/share", "/usr/src/", "/mnt/c", "/mnt/d", "/mnt/wslg", "/wsl"]
darwin = ["/dev", "/etc", "/usr/bin", "/usr/local/Homebrew", "/usr/lib", "/usr/sbin", "/Applications", "/Library/Developer", "/Library/Documentation", "/System"]

[logging]
logLevel = "INFO"
logFile = "logs/piidigger.log"

[tuning]
chunkCount = 100000
"#;

/// A config value that is either the literal `"all"` or an explicit list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum AllOrList {
    One(String),
    Many(Vec<String>),
}

impl AllOrList {
    fn is_all(&self) -> bool {
        match self {
            Self::One(s) => s.eq_ignore_ascii_case("all"),
            Self::Many(items) => items
                .first()
                .is_some_and(|s| s.eq_ignore_ascii_case("all")),
        }
    }

    fn into_list(self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s],
            Self::Many(items) => items,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(rename = "dataHandlers")]
    data_handlers: AllOrList,
    #[serde(rename = "localFilesOnly", default = "default_true")]
    local_files_only: bool,
    results: RawResults,
    #[serde(rename = "includeFiles")]
    include_files: RawIncludeFiles,
    #[serde(rename = "excludeDirs", default)]
    exclude_dirs: RawPerOs,
    #[serde(default)]
    logging: RawLogging,
    #[serde(default)]
    tuning: RawTuning,
}

#[derive(Debug, Deserialize)]
struct RawResults {
    path: String,
    #[serde(default)]
    json: bool,
    #[serde(default)]
    text: bool,
    #[serde(default)]
    csv: bool,
}

#[derive(Debug, Deserialize)]
struct RawIncludeFiles {
    ext: AllOrList,
    mime: AllOrList,
    #[serde(rename = "startDirs")]
    start_dirs: RawStartDirs,
}

#[derive(Debug, Deserialize)]
struct RawStartDirs {
    windows: Option<AllOrList>,
    linux: Option<AllOrList>,
    darwin: Option<AllOrList>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPerOs {
    #[serde(default)]
    windows: Vec<String>,
    #[serde(default)]
    linux: Vec<String>,
    #[serde(default)]
    darwin: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawLogging {
    #[serde(rename = "logLevel", default = "default_log_level")]
    log_level: String,
    #[serde(rename = "logFile", default = "default_log_file")]
    log_file: String,
}

fn default_log_level() -> String {
    "INFO".to_owned()
}

fn default_log_file() -> String {
    "logs/piidigger.log".to_owned()
}

impl Default for RawLogging {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_file: default_log_file(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawTuning {
    #[serde(rename = "chunkCount", default = "default_chunk_count")]
    chunk_count: usize,
}

fn default_chunk_count() -> usize {
    DEFAULT_CHUNK_COUNT
}

impl Default for RawTuning {
    fn default() -> Self {
        Self {
            chunk_count: DEFAULT_CHUNK_COUNT,
        }
    }
}

/// An enabled result sink format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OutputFormat {
    Json,
    Text,
    Csv,
}

impl OutputFormat {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
            Self::Csv => "csv",
        }
    }

    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => ".json",
            Self::Text => ".txt",
            Self::Csv => ".csv",
        }
    }
}

/// Fully-resolved scan settings. Immutable once built, except for the
/// dispatcher pool override from the command line.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_handlers: Vec<String>,
    pub start_dirs: Vec<PathBuf>,
    /// Lower-cased path prefixes; any directory whose full path starts
    /// with one of these is skipped.
    pub exclude_dirs: Vec<String>,
    pub file_exts: BTreeSet<String>,
    pub mime_types: BTreeSet<String>,
    pub local_files_only: bool,
    pub outputs: BTreeMap<OutputFormat, PathBuf>,
    pub log_file: PathBuf,
    pub log_level: LevelFilter,
    pub max_files_scan_procs: usize,
    pub max_procs: usize,
    pub chunk_count: usize,
    pub hostname: String,
}

impl Config {
    /// Load and resolve a configuration file. A missing file warns and
    /// falls back to the built-in default; a bad file is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                console::warn(&format!(
                    "Configuration file {} not found. Using default configuration.",
                    path.display()
                ));
                return Self::default_config();
            }
            Err(e) => {
                return Err(ConfigError::Io {
                    file: path.to_owned(),
                    source: e,
                });
            }
        };
        Self::from_toml(&text, &path.display().to_string())
    }

    /// The built-in default configuration.
    pub fn default_config() -> Result<Self, ConfigError> {
        Self::from_toml(DEFAULT_CONFIG_TOML, "internal config")
    }

    fn from_toml(text: &str, label: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text).map_err(|e| ConfigError::Parse {
            file: PathBuf::from(label),
            source: Box::new(e),
        })?;
        Self::resolve(raw, label)
    }

    fn resolve(raw: RawConfig, label: &str) -> Result<Self, ConfigError> {
        let hostname = gethostname::gethostname().to_string_lossy().into_owned();
        let timestamp = Local::now().format("%Y%m%d-%H%M%S").to_string();

        let data_handlers = resolve_data_handlers(raw.data_handlers, label);

        // Derive the per-format result paths up front; beyond this point
        // only the concrete filenames exist.
        let results_dir = PathBuf::from(&raw.results.path);
        let mut outputs = BTreeMap::new();
        for (format, enabled) in [
            (OutputFormat::Json, raw.results.json),
            (OutputFormat::Text, raw.results.text),
            (OutputFormat::Csv, raw.results.csv),
        ] {
            if enabled {
                let filename = format!("{hostname}-{timestamp}{}", format.extension());
                outputs.insert(format, results_dir.join(filename));
            }
        }

        let start_dirs = resolve_start_dirs(raw.include_files.start_dirs, label)?;
        let file_exts = resolve_exts(raw.include_files.ext, label);
        let mime_types = resolve_mimes(raw.include_files.mime, label);

        let log_file = PathBuf::from(&raw.logging.log_file);
        let exclude_dirs = resolve_exclude_dirs(raw.exclude_dirs, &results_dir, &log_file);

        Ok(Self {
            data_handlers,
            start_dirs,
            exclude_dirs,
            file_exts,
            mime_types,
            local_files_only: raw.local_files_only,
            outputs,
            log_file,
            log_level: parse_level(&raw.logging.log_level),
            max_files_scan_procs: 1,
            max_procs: num_cpus::get(),
            chunk_count: raw.tuning.chunk_count,
            hostname,
        })
    }

    pub fn set_max_procs(&mut self, procs: usize) {
        self.max_procs = procs.max(1);
    }

    /// Per-chunk byte budget for the extractors.
    #[must_use]
    pub fn max_content_size(&self) -> usize {
        MAX_CHUNK_SIZE * self.chunk_count
    }

    /// Write the default configuration file.
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        fs::write(path, DEFAULT_CONFIG_TOML)
    }
}

fn resolve_data_handlers(configured: AllOrList, label: &str) -> Vec<String> {
    if configured.is_all() {
        return detect::supported_names()
            .into_iter()
            .map(str::to_owned)
            .collect();
    }
    let supported = detect::supported_names();
    let (known, unknown): (Vec<String>, Vec<String>) = configured
        .into_list()
        .into_iter()
        .partition(|name| supported.contains(&name.as_str()));
    if !unknown.is_empty() {
        console::error(&format!(
            "Unexpected data handler found in configuration file ({label})"
        ));
        console::error(&format!(
            "The following data handlers will be ignored: {unknown:?}"
        ));
    }
    known
}

fn resolve_start_dirs(dirs: RawStartDirs, label: &str) -> Result<Vec<PathBuf>, ConfigError> {
    let configured = match os_key() {
        "windows" => dirs.windows,
        "darwin" => dirs.darwin,
        _ => dirs.linux,
    }
    .unwrap_or_else(|| AllOrList::Many(Vec::new()));

    if configured.is_all() {
        return Ok(all_start_dirs());
    }

    let mut resolved = Vec::new();
    for dir in configured.into_list() {
        let path = PathBuf::from(dir);
        if !path.is_dir() {
            console::error(&format!(
                "Starting directory does not exist ({}). Check configuration file ({label}).",
                path.display()
            ));
            return Err(ConfigError::MissingStartDir(path));
        }
        resolved.push(path);
    }
    Ok(resolved)
}

/// `"all"` start dirs: every existing drive root on Windows, the
/// filesystem root elsewhere.
#[cfg(windows)]
fn all_start_dirs() -> Vec<PathBuf> {
    ('A'..='Z')
        .filter_map(|drive| {
            let root = format!("{drive}:\\");
            Path::new(&root).exists().then(|| PathBuf::from(root))
        })
        .collect()
}

#[cfg(not(windows))]
fn all_start_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("/")]
}

fn resolve_exts(configured: AllOrList, label: &str) -> BTreeSet<String> {
    let supported: BTreeSet<String> = registry().supported_exts().into_iter().collect();
    if configured.is_all() {
        return supported;
    }
    // Fix up extensions that were written without the leading period.
    let normalized: Vec<String> = configured
        .into_list()
        .into_iter()
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            if ext.starts_with('.') {
                ext
            } else {
                format!(".{ext}")
            }
        })
        .collect();
    let (known, unknown): (Vec<String>, Vec<String>) = normalized
        .into_iter()
        .partition(|ext| supported.contains(ext));
    if !unknown.is_empty() {
        console::error(&format!(
            "Unexpected file extensions found in configuration file ({label})"
        ));
        console::error(&format!(
            "The following file extensions will be ignored: {unknown:?}"
        ));
    }
    known.into_iter().collect()
}

fn resolve_mimes(configured: AllOrList, label: &str) -> BTreeSet<String> {
    if !mime_supported() {
        return BTreeSet::new();
    }
    let supported: BTreeSet<String> = registry().supported_mimes().into_iter().collect();
    if configured.is_all() {
        return supported;
    }
    let (known, unknown): (Vec<String>, Vec<String>) = configured
        .into_list()
        .into_iter()
        .partition(|mime| supported.contains(mime));
    if !unknown.is_empty() {
        console::error(&format!(
            "Unexpected MIME types found in configuration file ({label})"
        ));
        console::error(&format!(
            "The following MIME types will be ignored: {unknown:?}"
        ));
    }
    known.into_iter().collect()
}

fn resolve_exclude_dirs(dirs: RawPerOs, results_dir: &Path, log_file: &Path) -> Vec<String> {
    let mut excludes = match os_key() {
        "windows" => dirs.windows,
        "darwin" => dirs.darwin,
        _ => dirs.linux,
    };

    // Never scan our own output: the results directory and the log
    // directory join the exclude list.
    let root = std::env::current_dir().unwrap_or_default();
    excludes.push(root.join(results_dir).to_string_lossy().into_owned());
    if let Some(log_dir) = root.join(log_file).parent() {
        excludes.push(log_dir.to_string_lossy().into_owned());
    }

    excludes.into_iter().map(|d| d.to_lowercase()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_config() -> Config {
        Config::default_config().expect("default config parses")
    }

    #[test]
    fn default_config_resolves() {
        let config = default_config();
        assert_eq!(config.data_handlers, vec!["pan"]);
        assert!(config.local_files_only);
        assert_eq!(config.max_files_scan_procs, 1);
        assert!(config.max_procs >= 1);
        assert_eq!(config.chunk_count, DEFAULT_CHUNK_COUNT);
        assert_eq!(config.log_level, LevelFilter::Info);
    }

    #[test]
    fn all_substitutes_the_supported_sets() {
        let config = default_config();
        let supported: BTreeSet<String> = registry().supported_exts().into_iter().collect();
        assert_eq!(config.file_exts, supported);
        assert!(config.mime_types.contains("application/pdf"));
    }

    #[test]
    fn output_files_carry_hostname_timestamp_and_extension() {
        let config = default_config();
        assert_eq!(config.outputs.len(), 2);
        let json = config.outputs[&OutputFormat::Json]
            .to_string_lossy()
            .into_owned();
        assert!(json.starts_with("piidigger-results/"));
        assert!(json.contains(&config.hostname));
        assert!(json.ends_with(".json"));
        assert!(!config.outputs.contains_key(&OutputFormat::Csv));
    }

    #[test]
    fn unknown_data_handlers_are_dropped() {
        let toml = DEFAULT_CONFIG_TOML.replace(
            r#"dataHandlers = ["pan"]"#,
            r#"dataHandlers = ["pan", "ssn", "email"]"#,
        );
        let config = Config::from_toml(&toml, "test").expect("parses");
        assert_eq!(config.data_handlers, vec!["pan", "email"]);
    }

    #[test]
    fn extensions_are_normalized_and_filtered() {
        let toml =
            DEFAULT_CONFIG_TOML.replace(r#"ext = "all""#, r#"ext = ["TXT", ".pdf", ".nope"]"#);
        let config = Config::from_toml(&toml, "test").expect("parses");
        assert_eq!(
            config.file_exts,
            BTreeSet::from([".txt".to_owned(), ".pdf".to_owned()])
        );
    }

    #[test]
    fn empty_mime_list_disables_mime_matching() {
        let toml = DEFAULT_CONFIG_TOML.replace(r#"mime = "all""#, "mime = []");
        let config = Config::from_toml(&toml, "test").expect("parses");
        assert!(config.mime_types.is_empty());
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        assert!(matches!(
            Config::from_toml("this is { not toml", "test"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn missing_start_dir_is_rejected() {
        let toml = DEFAULT_CONFIG_TOML.replace(
            r#"linux = ["/"]"#,
            r#"linux = ["/no/such/dir/anywhere"]"#,
        );
        if os_key() == "linux" {
            assert!(matches!(
                Config::from_toml(&toml, "test"),
                Err(ConfigError::MissingStartDir(_))
            ));
        }
    }

    #[test]
    fn results_and_log_dirs_join_the_excludes() {
        let config = default_config();
        let cwd = std::env::current_dir()
            .expect("cwd")
            .to_string_lossy()
            .to_lowercase();
        assert!(
            config
                .exclude_dirs
                .iter()
                .any(|d| d.starts_with(&cwd) && d.contains("piidigger-results"))
        );
        assert!(config.exclude_dirs.iter().any(|d| d.ends_with("logs")));
    }

    #[test]
    fn chunk_count_is_tunable() {
        let toml = DEFAULT_CONFIG_TOML.replace("chunkCount = 100000", "chunkCount = 10");
        let config = Config::from_toml(&toml, "test").expect("parses");
        assert_eq!(config.max_content_size(), MAX_CHUNK_SIZE * 10);
    }

    #[test]
    fn written_default_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("piidigger.toml");
        Config::write_default(&path).expect("write");
        let config = Config::load(&path).expect("load");
        assert_eq!(config.data_handlers, vec!["pan"]);
    }

    #[test]
    fn missing_file_falls_back_to_default() {
        let config = Config::load(Path::new("/no/such/piidigger.toml")).expect("fallback");
        assert_eq!(config.data_handlers, vec!["pan"]);
    }
}

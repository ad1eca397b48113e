//! The file finder: per-directory enumeration and admission of candidate
//! files.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, info};

use crate::config::Config;
use crate::counters::ScanCounters;
use crate::manager::StopFlag;
use crate::mime::mime_of;
use crate::platform::is_local_file;
use crate::queue::{Envelope, WorkQueue};
use crate::scan::{FileRef, extension_of};

const LOG_TARGET: &str = "file_finder";

/// Pop directories from `dirs_q`, admit their files onto `files_q`.
///
/// Sentinel discipline: a worker that sees the dirs sentinel exits; every
/// exiting worker except the last re-posts it so its peers terminate too,
/// and the last worker out posts exactly one files sentinel downstream.
/// `active_finders` is pre-seeded with the pool size, so the election
/// holds even when a peer has not finished starting yet.
pub fn run_file_finder(
    config: &Config,
    dirs_q: &WorkQueue<PathBuf>,
    files_q: &WorkQueue<FileRef>,
    counters: &Arc<ScanCounters>,
    stop: &StopFlag,
    active_finders: &Arc<AtomicUsize>,
) {
    info!(target: LOG_TARGET, "Starting file finder");

    loop {
        if stop.is_set() {
            break;
        }
        match dirs_q.get() {
            None => continue,
            Some(Envelope::Sentinel) => break,
            Some(Envelope::Item(dir)) => {
                ScanCounters::incr(&counters.dirs_scanned);
                info!(target: LOG_TARGET, "Scanning directory: {}", dir.display());
                scan_directory(&dir, config, files_q, counters, stop);
            }
        }
    }

    if stop.is_set() {
        dirs_q.clear();
        files_q.clear();
    }

    let remaining = active_finders.fetch_sub(1, Ordering::AcqRel) - 1;
    if remaining == 0 {
        info!(
            target: LOG_TARGET,
            "Last file finder stopped. Found {} files",
            counters.snapshot().files_found,
        );
        files_q.put_sentinel(stop);
    } else {
        info!(target: LOG_TARGET, "File finder stopped. {remaining} remaining");
        dirs_q.put_sentinel(stop);
    }
}

fn scan_directory(
    dir: &std::path::Path,
    config: &Config,
    files_q: &WorkQueue<FileRef>,
    counters: &Arc<ScanCounters>,
    stop: &StopFlag,
) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(target: LOG_TARGET, "{}: {e}", dir.display());
            return;
        }
    };

    for entry in entries {
        if stop.is_set() {
            return;
        }
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(target: LOG_TARGET, "{}: {e}", dir.display());
                continue;
            }
        };
        let path = entry.path();
        // Follows symlinks, so a link to a regular file is admitted and a
        // broken link lands in the error arm.
        let meta = match path.metadata() {
            Ok(meta) => meta,
            Err(e) => {
                debug!(target: LOG_TARGET, "{}: {e}", path.display());
                continue;
            }
        };

        let is_file = meta.is_file();
        let is_not_zero = meta.len() > 0;
        let is_local = !config.local_files_only || is_local_file(&path);
        if !(is_file && is_not_zero && is_local) {
            debug!(
                target: LOG_TARGET,
                "{}: failed file checks (is_file={is_file}, is_not_zero={is_not_zero}, is_local={is_local})",
                path.display(),
            );
            continue;
        }

        let mime = mime_of(&path);
        if !matches_filters(&path, mime, config) {
            debug!(
                target: LOG_TARGET,
                "{}: not added (suffix: {} | mime: {})",
                path.display(),
                extension_of(&path),
                mime.unwrap_or("unknown"),
            );
            continue;
        }

        match FileRef::new(path, &meta, mime) {
            Some(file_ref) => {
                debug!(
                    target: LOG_TARGET,
                    "Admitted {} (handler={}, size={})",
                    file_ref.path.display(),
                    file_ref.handler,
                    file_ref.size,
                );
                ScanCounters::incr(&counters.files_found);
                ScanCounters::add(&counters.bytes_found, file_ref.size);
                files_q.put(file_ref, stop);
            }
            None => {
                debug!(
                    target: LOG_TARGET,
                    "{}: no extractor claims this file",
                    entry.path().display(),
                );
            }
        }
    }
}

/// Admission by extension OR (when MIME detection is enabled) MIME type.
fn matches_filters(path: &std::path::Path, mime: Option<&'static str>, config: &Config) -> bool {
    let ext_found = config.file_exts.contains(&extension_of(path));
    let mime_found = !config.mime_types.is_empty()
        && mime.is_some_and(|m| config.mime_types.contains(m));
    ext_found || mime_found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::fs;

    fn finder_config(exts: &[&str], mimes: &[&str]) -> Config {
        let mut config = Config::default_config().expect("default config");
        config.file_exts = exts.iter().map(|e| (*e).to_owned()).collect();
        config.mime_types = mimes.iter().map(|m| (*m).to_owned()).collect();
        config
    }

    fn run_one(dir: &std::path::Path, config: &Config) -> (Vec<FileRef>, Arc<ScanCounters>) {
        let dirs_q = WorkQueue::bounded();
        let files_q = WorkQueue::bounded();
        let counters = Arc::new(ScanCounters::default());
        let stop = StopFlag::new();
        dirs_q.put(dir.to_owned(), &stop);
        dirs_q.put_sentinel(&stop);
        run_file_finder(
            config,
            &dirs_q,
            &files_q,
            &counters,
            &stop,
            &Arc::new(AtomicUsize::new(1)),
        );

        let mut found = Vec::new();
        while let Some(envelope) = files_q.try_get() {
            match envelope {
                Envelope::Item(file_ref) => found.push(file_ref),
                Envelope::Sentinel => break,
            }
        }
        (found, counters)
    }

    #[test]
    fn admits_by_extension_and_counts() {
        let root = tempfile::tempdir().expect("tempdir");
        fs::write(root.path().join("hit.txt"), "some text").expect("write");
        fs::write(root.path().join("miss.bin"), "\x00\x01").expect("write");

        let config = finder_config(&[".txt"], &[]);
        let (found, counters) = run_one(root.path(), &config);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].handler, "plaintext");
        let snap = counters.snapshot();
        assert_eq!(snap.files_found, 1);
        assert_eq!(snap.bytes_found, 9);
        assert_eq!(snap.dirs_scanned, 1);
    }

    #[test]
    fn zero_byte_files_are_rejected() {
        let root = tempfile::tempdir().expect("tempdir");
        fs::write(root.path().join("empty.txt"), "").expect("write");

        let config = finder_config(&[".txt"], &[]);
        let (found, counters) = run_one(root.path(), &config);
        assert!(found.is_empty());
        assert_eq!(counters.snapshot().files_found, 0);
    }

    #[test]
    fn mime_match_admits_when_the_extension_does_not() {
        let root = tempfile::tempdir().expect("tempdir");
        // .json is deliberately not in the configured extensions; its
        // application/json MIME type carries the admission instead.
        fs::write(root.path().join("data.json"), r#"{"k": 1}"#).expect("write");

        let ext_only = finder_config(&[".txt"], &[]);
        let (found, _) = run_one(root.path(), &ext_only);
        assert!(found.is_empty());

        let with_mime = finder_config(&[".txt"], &["application/json"]);
        let (found, _) = run_one(root.path(), &with_mime);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn subdirectories_are_not_files() {
        let root = tempfile::tempdir().expect("tempdir");
        fs::create_dir(root.path().join("dir.txt")).expect("mkdir");

        let config = finder_config(&[".txt"], &[]);
        let (found, _) = run_one(root.path(), &config);
        assert!(found.is_empty());
    }

    #[test]
    fn last_finder_posts_the_files_sentinel() {
        let root = tempfile::tempdir().expect("tempdir");
        let config = finder_config(&[".txt"], &[]);
        let dirs_q: WorkQueue<PathBuf> = WorkQueue::bounded();
        let files_q: WorkQueue<FileRef> = WorkQueue::bounded();
        let stop = StopFlag::new();
        dirs_q.put(root.path().to_owned(), &stop);
        dirs_q.put_sentinel(&stop);
        run_file_finder(
            &config,
            &dirs_q,
            &files_q,
            &Arc::new(ScanCounters::default()),
            &stop,
            &Arc::new(AtomicUsize::new(1)),
        );
        assert!(matches!(files_q.try_get(), Some(Envelope::Sentinel)));
    }

    #[test]
    fn extension_comparison_is_case_insensitive() {
        let root = tempfile::tempdir().expect("tempdir");
        fs::write(root.path().join("REPORT.TXT"), "content").expect("write");

        let mut config = finder_config(&[".txt"], &[]);
        config.mime_types = BTreeSet::new();
        let (found, _) = run_one(root.path(), &config);
        assert_eq!(found.len(), 1);
    }
}

//! The directory walker: breadth-first enumeration of everything under the
//! configured roots, feeding the file finders.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info};

use crate::config::Config;
use crate::counters::ScanCounters;
use crate::manager::StopFlag;
use crate::queue::WorkQueue;

const LOG_TARGET: &str = "dir_walker";

/// Walk every start dir breadth-first, pushing each admitted directory
/// onto `dirs_q`. Posts the sentinel on clean exit; on cancellation the
/// queue is drained instead so consumers unblock quickly.
pub fn run_dir_walker(
    config: &Config,
    dirs_q: &WorkQueue<PathBuf>,
    counters: &Arc<ScanCounters>,
    stop: &StopFlag,
) {
    info!(target: LOG_TARGET, "Starting directory walker");

    let mut pending: VecDeque<PathBuf> = VecDeque::new();
    for dir in &config.start_dirs {
        pending.push_back(dir.clone());
        dirs_q.put(dir.clone(), stop);
        ScanCounters::incr(&counters.dirs_found);
    }

    'walk: while let Some(dir) = pending.pop_front() {
        if stop.is_set() {
            break;
        }
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                // Unreadable roots and vanished directories are routine;
                // note them and keep going.
                debug!(target: LOG_TARGET, "{}: {e}", dir.display());
                continue;
            }
        };
        for entry in entries {
            if stop.is_set() {
                break 'walk;
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(target: LOG_TARGET, "{}: {e}", dir.display());
                    continue;
                }
            };
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(e) => {
                    debug!(target: LOG_TARGET, "{}: {e}", entry.path().display());
                    continue;
                }
            };
            // Symlinked directories are never followed; a link cycle
            // cannot trap the walker.
            if !file_type.is_dir() || file_type.is_symlink() {
                continue;
            }

            let path = entry.path();
            if is_excluded(&path, &config.exclude_dirs) {
                continue;
            }
            debug!(target: LOG_TARGET, "Including directory {}", path.display());
            pending.push_back(path.clone());
            dirs_q.put(path, stop);
            ScanCounters::incr(&counters.dirs_found);
        }
    }

    if stop.is_set() {
        dirs_q.clear();
    } else {
        dirs_q.put_sentinel(stop);
    }
    info!(
        target: LOG_TARGET,
        "Found {} folders",
        counters.snapshot().dirs_found,
    );
}

fn is_excluded(path: &std::path::Path, exclude_dirs: &[String]) -> bool {
    let lowered = path.to_string_lossy().to_lowercase();
    for pattern in exclude_dirs {
        if lowered.starts_with(pattern.as_str()) {
            debug!(
                target: LOG_TARGET,
                "Excluding directory {} matched pattern {pattern}",
                path.display(),
            );
            return true;
        }
    }
    false
}

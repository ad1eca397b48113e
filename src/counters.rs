use std::sync::atomic::{AtomicU64, Ordering};

/// Shared scan totals, updated by every stage and rendered by the progress
/// reporter. Plain atomics; relaxed ordering is enough for statistics that
/// only ever increase.
#[derive(Debug, Default)]
pub struct ScanCounters {
    pub dirs_found: AtomicU64,
    pub dirs_scanned: AtomicU64,
    pub files_found: AtomicU64,
    pub files_scanned: AtomicU64,
    pub bytes_found: AtomicU64,
    pub bytes_scanned: AtomicU64,
    pub total_results: AtomicU64,
}

/// A point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub dirs_found: u64,
    pub dirs_scanned: u64,
    pub files_found: u64,
    pub files_scanned: u64,
    pub bytes_found: u64,
    pub bytes_scanned: u64,
    pub total_results: u64,
}

impl ScanCounters {
    pub fn add(counter: &AtomicU64, amount: u64) {
        counter.fetch_add(amount, Ordering::Relaxed);
    }

    pub fn incr(counter: &AtomicU64) {
        Self::add(counter, 1);
    }

    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            dirs_found: self.dirs_found.load(Ordering::Relaxed),
            dirs_scanned: self.dirs_scanned.load(Ordering::Relaxed),
            files_found: self.files_found.load(Ordering::Relaxed),
            files_scanned: self.files_scanned.load(Ordering::Relaxed),
            bytes_found: self.bytes_found.load(Ordering::Relaxed),
            bytes_scanned: self.bytes_scanned.load(Ordering::Relaxed),
            total_results: self.total_results.load(Ordering::Relaxed),
        }
    }
}

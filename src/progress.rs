//! The progress reporter: a once-a-second status line rendered from the
//! shared counters.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::info;

use crate::console;
use crate::counters::{CounterSnapshot, ScanCounters};
use crate::manager::StopFlag;

const RENDER_INTERVAL: Duration = Duration::from_secs(1);

/// Repaint the status line until the stop flag is raised. The final state
/// is rendered once more after the flag is observed, so the last update
/// never goes missing.
pub fn run_progress(counters: &Arc<ScanCounters>, started: Instant, stop: &StopFlag) {
    info!(target: "progress", "Starting progress reporter");
    console::normal("If needed, press CTRL-C to terminate scan");

    let mut last_len = 0usize;
    loop {
        let mut line = render_line(&counters.snapshot(), started.elapsed());
        let width = console::width();
        if line.len() > width {
            line.truncate(width.saturating_sub(1));
        }
        // Pad over whatever the previous, possibly longer line left behind.
        let padding = last_len.saturating_sub(line.len());
        last_len = line.len();
        line.push_str(&" ".repeat(padding));
        console::status(&line);

        // Checking the flag after the repaint guarantees one final update.
        if stop.is_set() {
            break;
        }
        std::thread::sleep(RENDER_INTERVAL);
    }
    console::normal("");
    info!(target: "progress", "Stopping progress reporter");
}

fn render_line(snapshot: &CounterSnapshot, elapsed: Duration) -> String {
    format!(
        "{} | Folders scanned: {}/{} | Files scanned: {}/{} ({}/{}) | Results found: {}",
        format_elapsed(elapsed),
        snapshot.dirs_scanned,
        snapshot.dirs_found,
        snapshot.files_scanned,
        snapshot.files_found,
        sizeof_fmt(snapshot.bytes_scanned),
        sizeof_fmt(snapshot.bytes_found),
        snapshot.total_results,
    )
}

fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Human-readable byte count (binary units).
#[must_use]
pub fn sizeof_fmt(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in ["B", "KB", "MB", "GB", "TB", "PB", "EB", "ZB"] {
        if value.abs() < 1024.0 {
            return format!("{value:.1}{unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.1}YB")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_use_binary_units() {
        assert_eq!(sizeof_fmt(0), "0.0B");
        assert_eq!(sizeof_fmt(1023), "1023.0B");
        assert_eq!(sizeof_fmt(1536), "1.5KB");
        assert_eq!(sizeof_fmt(1024 * 1024), "1.0MB");
    }

    #[test]
    fn elapsed_renders_hours_minutes_seconds() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "0:00:00");
        assert_eq!(format_elapsed(Duration::from_secs(3723)), "1:02:03");
    }

    #[test]
    fn the_status_line_reads_front_to_back() {
        let snapshot = CounterSnapshot {
            dirs_found: 10,
            dirs_scanned: 4,
            files_found: 3,
            files_scanned: 2,
            bytes_found: 2048,
            bytes_scanned: 1024,
            total_results: 1,
        };
        let line = render_line(&snapshot, Duration::from_secs(61));
        assert_eq!(
            line,
            "0:01:01 | Folders scanned: 4/10 | Files scanned: 2/3 (1.0KB/2.0KB) | Results found: 1"
        );
    }
}

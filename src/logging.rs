/*!
Queue-backed logging.

Workers log through the standard [`log`] facade; the installed backend does
nothing but stamp the record and push it onto a shared queue. A single
collector worker owns the log file and is the only thing that ever writes
to it, so worker threads never contend on file I/O.
*/

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Once, RwLock};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Local};
use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::console;
use crate::manager::StopFlag;
use crate::queue::{Envelope, WorkQueue};

/// How long the collector waits for stragglers to finish logging once the
/// stop flag has been observed.
const STRAGGLER_GRACE: Duration = Duration::from_secs(2);

/// One log record as it travels over the queue.
#[derive(Debug)]
pub struct LogEvent {
    pub timestamp: DateTime<Local>,
    pub level: Level,
    pub target: String,
    pub message: String,
}

/// The facade backend. The sink is swappable so that the logger survives
/// repeated pipeline runs in one process (the facade itself can only be
/// installed once).
struct QueueLogger {
    sink: RwLock<Option<WorkQueue<LogEvent>>>,
}

static LOGGER: QueueLogger = QueueLogger {
    sink: RwLock::new(None),
};
static INSTALL: Once = Once::new();

impl Log for QueueLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Ok(sink) = self.sink.read() {
            if let Some(queue) = sink.as_ref() {
                // The log queue is unbounded, so this never blocks.
                queue.put_nowait(LogEvent {
                    timestamp: Local::now(),
                    level: record.level(),
                    target: record.target().to_owned(),
                    message: record.args().to_string(),
                });
            }
        }
    }

    fn flush(&self) {}
}

/// Hands out the shared log queue and the collector worker body.
#[derive(Debug, Clone)]
pub struct LogManager {
    log_file: PathBuf,
    queue: WorkQueue<LogEvent>,
}

impl LogManager {
    /// Wire the facade to a fresh queue and set the level filter.
    pub fn install(log_file: &Path, level: LevelFilter) -> Self {
        let queue = WorkQueue::unbounded();
        if let Ok(mut sink) = LOGGER.sink.write() {
            *sink = Some(queue.clone());
        }
        INSTALL.call_once(|| {
            let _ = log::set_logger(&LOGGER);
        });
        log::set_max_level(level);
        Self {
            log_file: log_file.to_owned(),
            queue,
        }
    }

    #[must_use]
    pub fn queue(&self) -> WorkQueue<LogEvent> {
        self.queue.clone()
    }

    /// The collector body, for registration with a worker manager.
    #[must_use]
    pub fn collector(&self, stop: StopFlag) -> impl FnOnce() + Send + 'static {
        let log_file = self.log_file.clone();
        let queue = self.queue.clone();
        move || run_collector(&log_file, &queue, &stop)
    }
}

/// Drain the log queue into the log file until the sentinel arrives or the
/// stop flag is raised. The file is truncated at startup.
fn run_collector(log_file: &Path, queue: &WorkQueue<LogEvent>, stop: &StopFlag) {
    let file = match File::create(log_file) {
        Ok(f) => f,
        Err(e) => {
            console::error(&format!("could not open log file {}: {e}", log_file.display()));
            return;
        }
    };
    let mut out = BufWriter::new(file);

    loop {
        if stop.is_set() {
            // Cancelled: give the other stages a moment to queue their
            // final messages, then drain whatever is left.
            thread::sleep(STRAGGLER_GRACE);
            while let Some(envelope) = queue.try_get() {
                if let Envelope::Item(event) = envelope {
                    write_record(&mut out, &event);
                }
            }
            break;
        }
        match queue.get() {
            Some(Envelope::Item(event)) => write_record(&mut out, &event),
            Some(Envelope::Sentinel) => break,
            None => continue,
        }
    }
    let _ = out.flush();
}

fn write_record(out: &mut impl Write, event: &LogEvent) {
    let _ = writeln!(out, "{}", format_record(event));
}

/// `2026-08-01 09:15:42,123:[target]:LEVEL:message`
#[must_use]
pub fn format_record(event: &LogEvent) -> String {
    format!(
        "{}:[{}]:{}:{}",
        event.timestamp.format("%Y-%m-%d %H:%M:%S,%3f"),
        event.target,
        event.level,
        event.message,
    )
}

/// Map a configured level name onto a facade filter. Unrecognized names
/// fall back to INFO.
#[must_use]
pub fn parse_level(name: &str) -> LevelFilter {
    match name.to_ascii_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" | "warning" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" | "none" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

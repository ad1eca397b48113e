/*!
Pipeline wiring: queues, counters and the three worker managers.

The data pipeline is brought up in reverse order of data flow (sinks
first, walker last) so that every consumer exists before its producer
starts; shutdown joins in the opposite order. The log collector lives in
its own manager and outlives everything that can emit a log record.
*/

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::time::Instant;

use log::info;

use crate::config::Config;
use crate::console;
use crate::counters::{CounterSnapshot, ScanCounters};
use crate::dispatch::run_dispatcher;
use crate::error::PipelineError;
use crate::findings::Finding;
use crate::logging::LogManager;
use crate::manager::{StopFlag, WorkerManager};
use crate::platform::is_admin;
use crate::progress::run_progress;
use crate::queue::WorkQueue;
use crate::scan::FileRef;
use crate::scan::dirs::run_dir_walker;
use crate::scan::files::run_file_finder;

/// Totals of a completed (or cancelled) scan.
#[derive(Debug, Clone, Copy)]
pub struct ScanSummary {
    pub counters: CounterSnapshot,
}

/// Run one full scan. Returns after every stage, including the log
/// collector, has terminated.
pub fn run(config: Config, stop: StopFlag) -> Result<ScanSummary, PipelineError> {
    let started = Instant::now();
    let counters = Arc::new(ScanCounters::default());

    // Logging comes up first: everything downstream logs through it.
    create_parent_dir(&config.log_file)?;
    let log_manager = LogManager::install(&config.log_file, config.log_level);
    let mut logger_pm = WorkerManager::new("logger");
    {
        let log_manager = log_manager.clone();
        let stop = stop.clone();
        logger_pm.register("log_collector", 1, move |_| {
            Box::new(log_manager.collector(stop.clone()))
        });
    }
    logger_pm.start();

    info!(target: "main", "Starting piidigger {}", env!("CARGO_PKG_VERSION"));
    info!(target: "main", "Configuration: {config:?}");
    if config.mime_types.is_empty() {
        info!(target: "main", "MIME detection disabled.");
    }
    if !is_admin() {
        let message = "Not running as an administrator. File system access may be restricted.";
        console::warn(message);
        info!(target: "main", "{message}");
    }
    console::normal(&format!(
        "Scanning {:?} for files matching {:?}",
        config.start_dirs, config.data_handlers
    ));

    for output in config.outputs.values() {
        create_parent_dir(output)?;
    }

    // Queues connecting the stages.
    let dirs_q: WorkQueue<PathBuf> = WorkQueue::bounded();
    let files_q: WorkQueue<FileRef> = WorkQueue::bounded();
    let result_qs: Vec<(crate::config::OutputFormat, WorkQueue<Finding>)> = config
        .outputs
        .keys()
        .map(|format| (*format, WorkQueue::bounded()))
        .collect();

    // Pre-seeded with the pool sizes; each worker decrements on exit and
    // the one that reaches zero owns the downstream sentinels.
    let active_finders = Arc::new(AtomicUsize::new(config.max_files_scan_procs));
    let active_dispatchers = Arc::new(AtomicUsize::new(config.max_procs));
    let shared_config = Arc::new(config);

    // Data pipeline, registered sinks-first so the walker is joined first
    // and the sinks last.
    let mut main_pm = WorkerManager::new("pipeline");
    for (format, queue) in &result_qs {
        let sink = crate::output::sink_for(*format);
        let out_path = shared_config.outputs[format].clone();
        let queue = queue.clone();
        let stop = stop.clone();
        main_pm.register(&format!("{}_sink", format.as_str()), 1, move |_| {
            let out_path = out_path.clone();
            let queue = queue.clone();
            let stop = stop.clone();
            Box::new(move || sink(&out_path, &queue, &stop))
        });
    }
    {
        let config = Arc::clone(&shared_config);
        let dirs_q = dirs_q.clone();
        let files_q = files_q.clone();
        let counters = Arc::clone(&counters);
        let stop = stop.clone();
        let active = Arc::clone(&active_finders);
        main_pm.register("file_finder", shared_config.max_files_scan_procs, move |_| {
            let config = Arc::clone(&config);
            let dirs_q = dirs_q.clone();
            let files_q = files_q.clone();
            let counters = Arc::clone(&counters);
            let stop = stop.clone();
            let active = Arc::clone(&active);
            Box::new(move || {
                run_file_finder(&config, &dirs_q, &files_q, &counters, &stop, &active);
            })
        });
    }
    {
        let config = Arc::clone(&shared_config);
        let files_q = files_q.clone();
        let queues: Vec<WorkQueue<Finding>> =
            result_qs.iter().map(|(_, queue)| queue.clone()).collect();
        let counters = Arc::clone(&counters);
        let stop = stop.clone();
        let active = Arc::clone(&active_dispatchers);
        main_pm.register("dispatcher", shared_config.max_procs, move |_| {
            let config = Arc::clone(&config);
            let files_q = files_q.clone();
            let queues = queues.clone();
            let counters = Arc::clone(&counters);
            let stop = stop.clone();
            let active = Arc::clone(&active);
            Box::new(move || {
                run_dispatcher(&config, &files_q, &queues, &counters, &stop, &active);
            })
        });
    }
    {
        let config = Arc::clone(&shared_config);
        let dirs_q = dirs_q.clone();
        let counters = Arc::clone(&counters);
        let stop = stop.clone();
        main_pm.register("dir_walker", 1, move |_| {
            let config = Arc::clone(&config);
            let dirs_q = dirs_q.clone();
            let counters = Arc::clone(&counters);
            let stop = stop.clone();
            Box::new(move || run_dir_walker(&config, &dirs_q, &counters, &stop))
        });
    }

    console::normal(&format!(
        "Starting {} file scanner workers",
        shared_config.max_files_scan_procs
    ));
    console::normal(&format!(
        "Starting {} file handler workers",
        shared_config.max_procs
    ));

    let mut progress_pm = WorkerManager::new("progress");
    {
        let counters = Arc::clone(&counters);
        let stop = stop.clone();
        progress_pm.register("progress_line", 1, move |_| {
            let counters = Arc::clone(&counters);
            let stop = stop.clone();
            Box::new(move || run_progress(&counters, started, &stop))
        });
    }

    progress_pm.start();
    main_pm.start();
    main_pm.wait();

    // Data pipeline is down: post the log sentinel, join the collector,
    // then halt the progress line. On the sentinel path the collector
    // exits without the cancellation grace sleep.
    log_manager.queue().put_sentinel(&stop);
    logger_pm.wait();
    progress_pm.halt(&stop);

    // Nothing should be left in flight.
    dirs_q.clear();
    files_q.clear();
    for (_, queue) in &result_qs {
        queue.clear();
    }

    Ok(ScanSummary {
        counters: counters.snapshot(),
    })
}

fn create_parent_dir(path: &std::path::Path) -> Result<(), PipelineError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|source| PipelineError::CreateDir {
        path: parent.to_owned(),
        source,
    })
}

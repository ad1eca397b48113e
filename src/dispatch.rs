/*!
The extractor dispatcher: pulls admitted files, streams their text
through every enabled detector, and fans completed findings out to the
result sinks.
*/

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, error, info};

use crate::config::Config;
use crate::counters::ScanCounters;
use crate::detect::{self, DataHandler};
use crate::findings::Finding;
use crate::manager::StopFlag;
use crate::queue::{Envelope, WorkQueue};
use crate::registry::registry;
use crate::scan::FileRef;

const LOG_TARGET: &str = "dispatcher";

/// One dispatcher worker.
///
/// The last worker out is elected by `active_dispatchers` (pre-seeded
/// with the pool size) and owns the shutdown of the result queues: it
/// posts their sentinels and drains the file queue. Every other worker
/// re-posts one files sentinel so its peers see termination too.
pub fn run_dispatcher(
    config: &Config,
    files_q: &WorkQueue<FileRef>,
    result_qs: &[WorkQueue<Finding>],
    counters: &Arc<ScanCounters>,
    stop: &StopFlag,
    active_dispatchers: &Arc<AtomicUsize>,
) {
    info!(target: LOG_TARGET, "Starting dispatcher");

    let detectors: Vec<&'static dyn DataHandler> = config
        .data_handlers
        .iter()
        .filter_map(|name| detect::by_name(name))
        .collect();
    let max_content_size = config.max_content_size();

    loop {
        if stop.is_set() {
            break;
        }
        match files_q.get() {
            None => continue,
            Some(Envelope::Sentinel) => break,
            Some(Envelope::Item(file)) => {
                process_file(&file, &detectors, max_content_size, result_qs, counters, stop);
            }
        }
    }

    let remaining = active_dispatchers.fetch_sub(1, Ordering::AcqRel) - 1;
    if remaining == 0 {
        info!(target: LOG_TARGET, "Last dispatcher stopped. Clearing file queue.");
        for queue in result_qs {
            queue.put_sentinel(stop);
        }
        files_q.clear();
    } else {
        info!(target: LOG_TARGET, "Dispatcher stopped. {remaining} remaining");
        files_q.put_sentinel(stop);
    }
}

fn process_file(
    file: &FileRef,
    detectors: &[&'static dyn DataHandler],
    max_content_size: usize,
    result_qs: &[WorkQueue<Finding>],
    counters: &Arc<ScanCounters>,
    stop: &StopFlag,
) {
    let filename = file.path.display().to_string();
    let Some(handler) = registry().get(file.handler) else {
        error!(target: LOG_TARGET, "{filename}: no extractor registered as {}", file.handler);
        return;
    };
    info!(target: LOG_TARGET, "Processing {filename} with {}", handler.name());

    let mut finding = Finding::new(filename.clone());
    let chunks = handler.read_file(&file.path, max_content_size);
    consume_chunks(chunks, detectors, &mut finding);

    ScanCounters::incr(&counters.files_scanned);
    ScanCounters::add(&counters.bytes_scanned, file.size);

    if !finding.is_empty() {
        debug!(
            target: LOG_TARGET,
            "{filename}: matches found for {:?}",
            finding.matches.keys().collect::<Vec<_>>(),
        );
        ScanCounters::add(&counters.total_results, finding.total_matches());
        for queue in result_qs {
            queue.put(finding.clone(), stop);
        }
    }
    debug!(target: LOG_TARGET, "{filename}: processing complete");
}

/// Run every detector over every chunk. A misbehaving parser is confined
/// to its file: the panic ends the stream, and chunks already processed
/// still count toward the finding.
fn consume_chunks(
    mut chunks: crate::extract::ChunkStream,
    detectors: &[&'static dyn DataHandler],
    finding: &mut Finding,
) {
    loop {
        let next = catch_unwind(AssertUnwindSafe(|| chunks.next()));
        let chunk = match next {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(panic) => {
                error!(
                    target: LOG_TARGET,
                    "Unknown exception on file {}: {}",
                    finding.filename,
                    panic_message(panic.as_ref()),
                );
                break;
            }
        };
        debug!(
            target: LOG_TARGET,
            "{}: received {} bytes from file handler",
            finding.filename,
            chunk.len(),
        );
        for detector in detectors {
            finding.merge(detector.name(), detector.find_match(&chunk));
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn dispatch_config(handlers: &[&str]) -> Config {
        let mut config = Config::default_config().expect("default config");
        config.data_handlers = handlers.iter().map(|h| (*h).to_owned()).collect();
        config
    }

    fn run_over(file: FileRef, config: &Config) -> (Vec<Finding>, Arc<ScanCounters>) {
        let files_q = WorkQueue::bounded();
        let results_q = WorkQueue::bounded();
        let counters = Arc::new(ScanCounters::default());
        let stop = StopFlag::new();
        files_q.put(file, &stop);
        files_q.put_sentinel(&stop);
        run_dispatcher(
            config,
            &files_q,
            std::slice::from_ref(&results_q),
            &counters,
            &stop,
            &Arc::new(AtomicUsize::new(1)),
        );

        let mut findings = Vec::new();
        while let Some(envelope) = results_q.try_get() {
            match envelope {
                Envelope::Item(finding) => findings.push(finding),
                Envelope::Sentinel => break,
            }
        }
        (findings, counters)
    }

    fn text_file(content: &str) -> (tempfile::NamedTempFile, FileRef) {
        let mut file = tempfile::NamedTempFile::with_suffix(".txt").expect("temp file");
        file.write_all(content.as_bytes()).expect("write");
        let meta = file.path().metadata().expect("metadata");
        let file_ref = FileRef::new(file.path().to_owned(), &meta, Some("text/plain"))
            .expect("handler resolves");
        (file, file_ref)
    }

    #[test]
    fn a_matching_file_produces_one_finding() {
        let (_guard, file_ref) = text_file("the card 4893 0133 3538 6137 leaked");
        let size = file_ref.size;
        let config = dispatch_config(&["pan"]);
        let (findings, counters) = run_over(file_ref, &config);

        assert_eq!(findings.len(), 1);
        assert_eq!(
            findings[0].matches["pan"]["visa"],
            std::collections::BTreeSet::from(["4893 01** **** 6137".to_owned()])
        );
        let snap = counters.snapshot();
        assert_eq!(snap.files_scanned, 1);
        assert_eq!(snap.bytes_scanned, size);
        assert_eq!(snap.total_results, 1);
    }

    #[test]
    fn a_clean_file_produces_no_finding_but_still_counts() {
        let (_guard, file_ref) = text_file("nothing sensitive here");
        let config = dispatch_config(&["pan", "email"]);
        let (findings, counters) = run_over(file_ref, &config);

        assert!(findings.is_empty());
        assert_eq!(counters.snapshot().files_scanned, 1);
        assert_eq!(counters.snapshot().total_results, 0);
    }

    #[test]
    fn a_file_can_match_multiple_detectors() {
        let (_guard, file_ref) =
            text_file("card 371449635398431 belongs to support@example.com");
        let config = dispatch_config(&["pan", "email"]);
        let (findings, counters) = run_over(file_ref, &config);

        assert_eq!(findings.len(), 1);
        assert!(findings[0].matches.contains_key("pan"));
        assert!(findings[0].matches.contains_key("email"));
        assert_eq!(counters.snapshot().total_results, 2);
    }

    #[test]
    fn detector_order_follows_the_configuration() {
        let config = dispatch_config(&["email", "pan"]);
        let detectors: Vec<&str> = config
            .data_handlers
            .iter()
            .filter_map(|name| detect::by_name(name))
            .map(|d| d.name())
            .collect();
        assert_eq!(detectors, vec!["email", "pan"]);
    }

    #[test]
    fn findings_fan_out_to_every_result_queue() {
        let (_guard, file_ref) = text_file("a@b.co at");
        let config = dispatch_config(&["email"]);
        let files_q = WorkQueue::bounded();
        let q1: WorkQueue<Finding> = WorkQueue::bounded();
        let q2: WorkQueue<Finding> = WorkQueue::bounded();
        let counters = Arc::new(ScanCounters::default());
        let stop = StopFlag::new();
        files_q.put(file_ref, &stop);
        files_q.put_sentinel(&stop);
        run_dispatcher(
            &config,
            &files_q,
            &[q1.clone(), q2.clone()],
            &counters,
            &stop,
            &Arc::new(AtomicUsize::new(1)),
        );

        for queue in [q1, q2] {
            assert!(matches!(queue.try_get(), Some(Envelope::Item(_))));
            assert!(matches!(queue.try_get(), Some(Envelope::Sentinel)));
        }
        assert!(files_q.is_empty());
    }

    #[test]
    fn a_panicking_extractor_keeps_earlier_chunks() {
        struct ExplodingChunks {
            served: bool,
        }
        impl Iterator for ExplodingChunks {
            type Item = String;
            fn next(&mut self) -> Option<String> {
                if self.served {
                    panic!("synthetic parser failure");
                }
                self.served = true;
                Some("card 371449635398431 seen".to_owned())
            }
        }

        let detectors: Vec<&'static dyn DataHandler> =
            vec![detect::by_name("pan").expect("pan exists")];
        let mut finding = Finding::new("broken.pdf".to_owned());
        consume_chunks(
            Box::new(ExplodingChunks { served: false }),
            &detectors,
            &mut finding,
        );

        // The chunk served before the panic was processed.
        assert_eq!(finding.total_matches(), 1);
        assert!(finding.matches["pan"].contains_key("amex"));
    }

    #[test]
    fn an_unreadable_file_still_counts_as_scanned() {
        let file_ref = {
            let (file, file_ref) = text_file("gone soon");
            drop(file); // the temp file is removed here
            file_ref
        };
        let config = dispatch_config(&["pan"]);
        let (findings, counters) = run_over(file_ref, &config);
        assert!(findings.is_empty());
        assert_eq!(counters.snapshot().files_scanned, 1);
    }
}

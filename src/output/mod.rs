/*!
Result sinks. Each enabled output format owns one file and drains one
result queue until the sentinel arrives or cancellation is observed.

A `PermissionDenied` while opening or writing raises the shared stop flag
and ends the run; any other I/O failure is logged and the sink keeps
draining.
*/

pub mod csv;
pub mod json;
pub mod yaml;

use std::path::Path;

use crate::config::OutputFormat;
use crate::findings::Finding;
use crate::manager::StopFlag;
use crate::queue::WorkQueue;

/// The worker body for one sink.
pub type SinkFn = fn(&Path, &WorkQueue<Finding>, &StopFlag);

#[must_use]
pub fn sink_for(format: OutputFormat) -> SinkFn {
    match format {
        OutputFormat::Json => json::process_result,
        OutputFormat::Text => yaml::process_result,
        OutputFormat::Csv => csv::process_result,
    }
}

/// Treat permission failures as fatal for the whole scan; the results
/// would be lost anyway.
pub(crate) fn handle_write_error(
    target: &str,
    path: &Path,
    err: &std::io::Error,
    stop: &StopFlag,
) {
    if err.kind() == std::io::ErrorKind::PermissionDenied {
        crate::console::error(&format!("{}: {err}", path.display()));
        stop.set();
    } else {
        log::error!(target: target, "{}: {err}", path.display());
    }
}

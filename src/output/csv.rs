//! CSV sink: one `filename,datatype,value` row per redacted match.

use std::fs::File;
use std::path::Path;

use log::info;

use crate::findings::Finding;
use crate::manager::StopFlag;
use crate::output::handle_write_error;
use crate::queue::{Envelope, WorkQueue};

const LOG_TARGET: &str = "csv_sink";

pub fn process_result(out_path: &Path, queue: &WorkQueue<Finding>, stop: &StopFlag) {
    info!(target: LOG_TARGET, "Starting CSV output processor");
    let file = match File::create(out_path) {
        Ok(file) => file,
        Err(e) => {
            handle_write_error(LOG_TARGET, out_path, &e, stop);
            return;
        }
    };
    let mut writer = csv::Writer::from_writer(file);
    if let Err(e) = writer.write_record(["filename", "datatype", "value"]) {
        log::error!(target: LOG_TARGET, "{}: {e}", out_path.display());
    }

    loop {
        if stop.is_set() {
            break;
        }
        match queue.get() {
            Some(Envelope::Item(finding)) => {
                for (filename, datatype, value) in flatten(&finding) {
                    if let Err(e) = writer.write_record([filename, datatype, value.as_str()]) {
                        match e.into_kind() {
                            csv::ErrorKind::Io(io) => {
                                handle_write_error(LOG_TARGET, out_path, &io, stop);
                            }
                            other => {
                                log::error!(target: LOG_TARGET, "{}: {other:?}", out_path.display());
                            }
                        }
                        if stop.is_set() {
                            break;
                        }
                    }
                }
            }
            Some(Envelope::Sentinel) => break,
            None => continue,
        }
    }
    let _ = writer.flush();
    info!(target: LOG_TARGET, "Stopping CSV output processor");
}

/// Flatten the nested matches into rows; nested subtype values render as
/// `"{subtype}: {value}"`.
fn flatten(finding: &Finding) -> Vec<(&str, &str, String)> {
    let mut rows = Vec::new();
    for (datatype, subtypes) in &finding.matches {
        for (subtype, values) in subtypes {
            for value in values {
                rows.push((
                    finding.filename.as_str(),
                    datatype.as_str(),
                    format!("{subtype}: {value}"),
                ));
            }
        }
    }
    rows
}

//! Text sink: one YAML document appended per finding as it arrives.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;

use crate::findings::Finding;
use crate::manager::StopFlag;
use crate::output::handle_write_error;
use crate::queue::{Envelope, WorkQueue};

const LOG_TARGET: &str = "text_sink";

pub fn process_result(out_path: &Path, queue: &WorkQueue<Finding>, stop: &StopFlag) {
    info!(target: LOG_TARGET, "Starting text output processor");
    let file = match File::create(out_path) {
        Ok(file) => file,
        Err(e) => {
            handle_write_error(LOG_TARGET, out_path, &e, stop);
            return;
        }
    };
    let mut out = BufWriter::new(file);

    loop {
        if stop.is_set() {
            break;
        }
        match queue.get() {
            Some(Envelope::Item(finding)) => {
                let doc = match serde_yaml::to_string(&finding) {
                    Ok(doc) => doc,
                    Err(e) => {
                        log::error!(target: LOG_TARGET, "{}: {e}", finding.filename);
                        continue;
                    }
                };
                if let Err(e) = out.write_all(doc.as_bytes()) {
                    handle_write_error(LOG_TARGET, out_path, &e, stop);
                    if stop.is_set() {
                        break;
                    }
                }
            }
            Some(Envelope::Sentinel) => break,
            None => continue,
        }
    }
    let _ = out.flush();
    info!(target: LOG_TARGET, "Stopping text output processor");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Matches;
    use std::collections::BTreeSet;

    #[test]
    fn each_finding_streams_as_yaml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("results.txt");
        let queue = WorkQueue::bounded();
        let stop = StopFlag::new();

        let mut finding = Finding::new("a.txt".to_owned());
        let mut matches = Matches::new();
        matches.insert("email".to_owned(), BTreeSet::from(["*@b.co".to_owned()]));
        finding.merge("email", matches);
        queue.put(finding, &stop);
        queue.put_sentinel(&stop);

        process_result(&out, &queue, &stop);

        let written = std::fs::read_to_string(&out).expect("read back");
        assert!(written.contains("filename: a.txt"));
        assert!(written.contains("- '*@b.co'"));
    }
}

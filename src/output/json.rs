//! JSON sink: findings accumulate in memory and are written as one
//! pretty-printed array when the queue shuts down.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use log::{error, info};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::findings::Finding;
use crate::manager::StopFlag;
use crate::output::handle_write_error;
use crate::queue::{Envelope, WorkQueue};

const LOG_TARGET: &str = "json_sink";

pub fn process_result(out_path: &Path, queue: &WorkQueue<Finding>, stop: &StopFlag) {
    info!(target: LOG_TARGET, "Starting JSON output processor");
    let mut all_results: Vec<Finding> = Vec::new();

    loop {
        if stop.is_set() {
            break;
        }
        match queue.get() {
            Some(Envelope::Item(finding)) => all_results.push(finding),
            Some(Envelope::Sentinel) => break,
            None => continue,
        }
    }

    match File::create(out_path) {
        Ok(file) => {
            let mut serializer = Serializer::with_formatter(
                BufWriter::new(file),
                PrettyFormatter::with_indent(b"    "),
            );
            if let Err(e) = all_results.serialize(&mut serializer) {
                error!(target: LOG_TARGET, "{}: {e}", out_path.display());
            }
            info!(target: LOG_TARGET, "Wrote {} findings", all_results.len());
        }
        Err(e) => handle_write_error(LOG_TARGET, out_path, &e, stop),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Matches;
    use std::collections::BTreeSet;

    fn finding(filename: &str, value: &str) -> Finding {
        let mut f = Finding::new(filename.to_owned());
        let mut matches = Matches::new();
        matches.insert("visa".to_owned(), BTreeSet::from([value.to_owned()]));
        f.merge("pan", matches);
        f
    }

    #[test]
    fn writes_a_pretty_array_on_sentinel() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("results.json");
        let queue = WorkQueue::bounded();
        let stop = StopFlag::new();
        queue.put(finding("a.txt", "4893 01** **** 6137"), &stop);
        queue.put(finding("b.txt", "489301******6137"), &stop);
        queue.put_sentinel(&stop);

        process_result(&out, &queue, &stop);

        let written = std::fs::read_to_string(&out).expect("read back");
        let parsed: serde_json::Value = serde_json::from_str(&written).expect("valid json");
        assert_eq!(parsed.as_array().map(Vec::len), Some(2));
        // 4-space indent on the second line.
        assert!(written.lines().nth(1).is_some_and(|l| l.starts_with("    ")));
    }

    #[test]
    fn an_empty_run_writes_an_empty_array() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("results.json");
        let queue: WorkQueue<Finding> = WorkQueue::bounded();
        let stop = StopFlag::new();
        queue.put_sentinel(&stop);

        process_result(&out, &queue, &stop);
        let written = std::fs::read_to_string(&out).expect("read back");
        assert_eq!(written.trim(), "[]");
    }
}

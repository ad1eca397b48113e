use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::detect::Matches;

/// One file's worth of redacted matches, keyed by detector name and then
/// subtype. Sets deduplicate within the file; the sorted containers mean
/// serialization emits sorted lists with no extra pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub filename: String,
    pub matches: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
}

impl Finding {
    #[must_use]
    pub fn new(filename: String) -> Self {
        Self {
            filename,
            matches: BTreeMap::new(),
        }
    }

    /// Fold one detector's chunk results in. Empty value sets are dropped
    /// so a detector that matched nothing leaves no trace.
    pub fn merge(&mut self, detector: &str, matches: Matches) {
        for (subtype, values) in matches {
            if values.is_empty() {
                continue;
            }
            self.matches
                .entry(detector.to_owned())
                .or_default()
                .entry(subtype)
                .or_default()
                .extend(values);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Total redacted values across all detectors and subtypes.
    #[must_use]
    pub fn total_matches(&self) -> u64 {
        self.matches
            .values()
            .flat_map(BTreeMap::values)
            .map(|values| values.len() as u64)
            .sum()
    }
}

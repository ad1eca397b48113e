/*!
Data handlers: rule units that match and redact one class of PII.

Detectors are pure and thread-safe. They consume one text chunk and
return redacted values keyed by subtype; an empty map means no match.
Sorted containers are used throughout so that serialized findings are
deterministic without a separate sort pass.
*/

pub mod email;
pub mod pan;

use std::collections::{BTreeMap, BTreeSet};

/// Subtype -> redacted values found in one chunk.
pub type Matches = BTreeMap<String, BTreeSet<String>>;

pub trait DataHandler: Sync {
    fn name(&self) -> &'static str;

    /// Match one chunk. Values in the result are already redacted.
    fn find_match(&self, chunk: &str) -> Matches;
}

static HANDLERS: &[&dyn DataHandler] = &[&pan::PanHandler, &email::EmailHandler];

/// Every built-in detector, in registration order.
#[must_use]
pub fn supported() -> &'static [&'static dyn DataHandler] {
    HANDLERS
}

#[must_use]
pub fn supported_names() -> Vec<&'static str> {
    HANDLERS.iter().map(|h| h.name()).collect()
}

#[must_use]
pub fn by_name(name: &str) -> Option<&'static dyn DataHandler> {
    HANDLERS.iter().copied().find(|h| h.name() == name)
}

//! Email address detection.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::detect::{DataHandler, Matches};

pub struct EmailHandler;

/// RFC 5322-style address pattern, including quoted local parts and
/// bracketed IP-literal domains.
static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?:[a-zA-Z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-zA-Z0-9!#$%&'*+/=?^_`{|}~-]+)*|"(?:[\x01-\x08\x0b\x0c\x0e-\x1f\x21\x23-\x5b\x5d-\x7f]|\\[\x01-\x09\x0b\x0c\x0e-\x7f])*")@(?:(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?\.)+[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?|\[(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?|[a-zA-Z0-9-]*[a-zA-Z0-9]:(?:[\x01-\x08\x0b\x0c\x0e-\x1f\x21-\x5a\x53-\x7f]|\\[\x01-\x09\x0b\x0c\x0e-\x7f])+)\])"#,
    )
    .expect("hand-checked pattern")
});

static TLD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.[A-Za-z]{2,63}$").expect("hand-checked pattern"));

const MAX_LOCAL_LEN: usize = 64;
const MAX_DOMAIN_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

impl DataHandler for EmailHandler {
    fn name(&self) -> &'static str {
        "email"
    }

    fn find_match(&self, chunk: &str) -> Matches {
        let mut results = Matches::new();
        for m in EMAIL_PATTERN.find_iter(chunk) {
            let candidate = m.as_str().trim();
            if is_valid(candidate) {
                results
                    .entry("email".to_owned())
                    .or_insert_with(BTreeSet::new)
                    .insert(redact(candidate));
            }
        }
        results
    }
}

/// Structural gates on top of the pattern: exactly one `@`, sane part
/// lengths, dotted domain with an alphabetic TLD.
fn is_valid(text: &str) -> bool {
    let mut parts = text.splitn(2, '@');
    let (Some(local), Some(domain)) = (parts.next(), parts.next()) else {
        return false;
    };
    if text.matches('@').count() != 1 || local.is_empty() || domain.is_empty() {
        return false;
    }
    if local.len() > MAX_LOCAL_LEN || domain.len() > MAX_DOMAIN_LEN {
        return false;
    }
    if domain.split('.').any(|label| label.len() > MAX_LABEL_LEN) {
        return false;
    }
    TLD_PATTERN.is_match(domain)
}

/// Redact the local part by length; the domain passes through untouched.
fn redact(text: &str) -> String {
    let Some((local, domain)) = text.split_once('@') else {
        return text.to_owned();
    };

    let chars: Vec<char> = local.chars().collect();
    let len = chars.len();
    let redacted_local = match len {
        0 => String::new(),
        1 => "*".to_owned(),
        2..=5 => format!("{}{}", chars[0], "*".repeat(len - 1)),
        6..=9 => format!("{}{}{}", chars[0], "*".repeat(len - 2), chars[len - 1]),
        _ => format!(
            "{}{}{}",
            chars[..3].iter().collect::<String>(),
            "*".repeat(len - 4),
            chars[len - 1],
        ),
    };

    format!("{redacted_local}@{domain}")
}

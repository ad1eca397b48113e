//! Primary Account Number detection.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::detect::{DataHandler, Matches};

pub struct PanHandler;

/// Brand patterns. Candidates are anchored on non-digit/non-dot/non-hyphen
/// boundaries so that UUIDs and dotted version strings in log files do not
/// light up as card numbers.
static BRAND_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        (
            "visa",
            r"(?:^|[^\d.-])(4[0-9]{3}[ -]?[0-9]{4}[ -]?[0-9]{4}[ -]?[0-9]{4})(?:$|[^\d.-])",
        ),
        (
            "mc",
            r"(?:^|[^\d.-])(5[1-5][0-9]{2}[ -]?[0-9]{4}[ -]?[0-9]{4}[ -]?[0-9]{4})(?:$|[^\d.-])",
        ),
        (
            "discover",
            r"(?:^|[^\d.-])(6011[ -]?[0-9]{4}[ -]?[0-9]{4}[ -]?[0-9]{4})(?:$|[^\d.-])",
        ),
        (
            "jcb",
            r"(?:^|[^\d.-])((?:2131|1800|35[0-9]{3})[0-9]{11})(?:$|[^\d.-])",
        ),
        (
            "amex",
            r"(?:^|[^\d.-])(3[47][0-9]{2}[ -]?[0-9]{6}[ -]?[0-9]{5})(?:$|[^\d.-])",
        ),
    ]
    .into_iter()
    .map(|(brand, pattern)| (brand, Regex::new(pattern).expect("hand-checked pattern")))
    .collect()
});

impl DataHandler for PanHandler {
    fn name(&self) -> &'static str {
        "pan"
    }

    fn find_match(&self, chunk: &str) -> Matches {
        let mut results = Matches::new();
        for (brand, pattern) in BRAND_PATTERNS.iter() {
            for captures in pattern.captures_iter(chunk) {
                let Some(candidate) = captures.get(1) else {
                    continue;
                };
                let candidate = candidate.as_str().trim();
                if is_valid(candidate) {
                    results
                        .entry((*brand).to_owned())
                        .or_insert_with(BTreeSet::new)
                        .insert(redact(candidate));
                }
            }
        }
        results
    }
}

fn is_valid(text: &str) -> bool {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    luhn(&digits)
}

/// Mod-10 checksum: double every second digit from the right, sum the
/// digit sums, and the total must divide by ten.
fn luhn(digits: &str) -> bool {
    if digits.is_empty() {
        return false;
    }
    let sum: u32 = digits
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .enumerate()
        .map(|(i, d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                doubled / 10 + doubled % 10
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

/// Keep the first six and last four digits, star the middle, and restore
/// any separators at their original character positions.
fn redact(text: &str) -> String {
    let mut separators: Vec<(usize, char)> = Vec::new();
    let mut digits = String::new();
    for (pos, c) in text.chars().enumerate() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else {
            separators.push((pos, c));
        }
    }

    let last_four_at = digits.len().saturating_sub(4);
    let mut result = String::with_capacity(text.len());
    result.push_str(&digits[..6.min(digits.len())]);
    result.push_str(&"*".repeat(last_four_at.saturating_sub(6)));
    result.push_str(&digits[last_four_at..]);

    for (pos, c) in separators {
        if pos <= result.len() {
            result.insert(pos, c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches_for(text: &str) -> Matches {
        PanHandler.find_match(text)
    }

    fn single(text: &str) -> (String, Vec<String>) {
        let matches = matches_for(text);
        assert_eq!(matches.len(), 1, "expected one brand for {text:?}");
        let (brand, values) = matches.into_iter().next().expect("one entry");
        (brand, values.into_iter().collect())
    }

    #[test]
    fn visa_with_spaces_keeps_separator_positions() {
        let (brand, values) = single("4893 0133 3538 6137");
        assert_eq!(brand, "visa");
        assert_eq!(values, vec!["4893 01** **** 6137"]);
    }

    #[test]
    fn visa_with_hyphen_keeps_separator_positions() {
        let (brand, values) = single("48930133-35386137");
        assert_eq!(brand, "visa");
        assert_eq!(values, vec!["489301**-****6137"]);
    }

    #[test]
    fn amex_redacts_first_six_last_four() {
        let (brand, values) = single("371449635398431");
        assert_eq!(brand, "amex");
        assert_eq!(values, vec!["371449*****8431"]);
    }

    #[test]
    fn digit_runs_inside_larger_numbers_do_not_match() {
        assert!(matches_for("4012001037140001514E100010003220121800000011150").is_empty());
    }

    #[test]
    fn luhn_failures_are_rejected() {
        // Visa-shaped but checksum-invalid.
        assert!(matches_for("4893 0133 3538 6138").is_empty());
    }

    #[test]
    fn hyphen_anchored_strings_do_not_match() {
        // UUID-style context: the boundary class excludes a leading hyphen.
        assert!(matches_for("deadbeef-4893013335386137").is_empty());
    }

    #[test]
    fn embedded_candidates_are_found() {
        let (brand, values) = single("but not this4893 0133 3538 6137or this");
        assert_eq!(brand, "visa");
        assert_eq!(values, vec!["4893 01** **** 6137"]);
    }

    #[test]
    fn detection_is_deterministic() {
        let text = "cards 4893 0133 3538 6137 and 371449635398431";
        assert_eq!(matches_for(text), matches_for(text));
    }

    #[test]
    fn repeated_numbers_deduplicate() {
        let matches = matches_for("371449635398431 then again 371449635398431");
        assert_eq!(matches["amex"].len(), 1);
    }

    #[test]
    fn redaction_keeps_exactly_ten_digits() {
        let (_, values) = single("4893 0133 3538 6137");
        let digits: String = values[0].chars().filter(char::is_ascii_digit).collect();
        assert_eq!(digits, "4893016137");
    }
}

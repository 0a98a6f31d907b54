//! Identity-leak token detection for free-text quote fields.
//!
//! Detection is deliberately conservative: long digit runs are treated as
//! phone-like even when they might be something else. Over-redaction inside
//! the anonymity window is harmless; under-redaction is an incident.

use std::sync::OnceLock;

use regex::Regex;

/// Replacement for every matched token.
pub const REDACTED: &str = "[redacted]";

fn email_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}")
            .expect("email pattern is valid")
    })
}

fn phone_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // 7+ digits, optional leading +, separators allowed between digits.
        Regex::new(r"\+?[0-9](?:[0-9 ().\-/]*[0-9]){6,}")
            .expect("phone pattern is valid")
    })
}

fn name_pattern(name: &str) -> Option<Regex> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return None;
    }
    Regex::new(&format!("(?i){}", regex::escape(trimmed))).ok()
}

/// Remove identity-bearing tokens from free text.
///
/// `known_names` carries the supplier-provided names attached to the same
/// quote (contact name etc.), matched case-insensitively.
pub fn scrub(text: &str, known_names: &[&str]) -> String {
    let mut out = email_pattern().replace_all(text, REDACTED).into_owned();
    out = phone_pattern().replace_all(&out, REDACTED).into_owned();

    for name in known_names {
        if let Some(pattern) = name_pattern(name) {
            out = pattern.replace_all(&out, REDACTED).into_owned();
        }
    }

    out
}

/// Whether the text still carries an identity token.
pub fn contains_identity_token(text: &str, known_names: &[&str]) -> bool {
    if email_pattern().is_match(text) || phone_pattern().is_match(text) {
        return true;
    }

    known_names
        .iter()
        .filter_map(|n| name_pattern(n))
        .any(|p| p.is_match(text))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn scrubs_email_addresses() {
        let out = scrub("reach us at bids@acme-steel.example.com for details", &[]);
        assert!(!out.contains('@'));
        assert!(out.contains(REDACTED));
    }

    #[test]
    fn scrubs_phone_like_tokens() {
        let out = scrub("call +1 (415) 555-0142 after 5pm", &[]);
        assert!(out.contains(REDACTED));
        assert!(!contains_identity_token(&out, &[]));
    }

    #[test]
    fn scrubs_known_names_case_insensitively() {
        let out = scrub("Ask for DANA KOVACS, she handled the estimate", &["Dana Kovacs"]);
        assert!(!out.to_lowercase().contains("dana kovacs"));
        assert!(out.contains(REDACTED));
    }

    #[test]
    fn leaves_plain_text_alone() {
        let text = "Delivery within six weeks, steel grade S355.";
        assert_eq!(scrub(text, &[]), text);
        assert!(!contains_identity_token(text, &[]));
    }

    #[test]
    fn blank_known_names_are_ignored() {
        let text = "no identities here";
        assert_eq!(scrub(text, &["", "   "]), text);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: scrubbed output never matches the leak patterns again.
        #[test]
        fn scrub_is_complete(text in ".{0,200}") {
            let out = scrub(&text, &[]);
            prop_assert!(!contains_identity_token(&out, &[]));
        }
    }
}

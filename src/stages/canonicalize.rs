//! Text canonicalization for fingerprinting.
//!
//! Normalizes raw feed text so that trivially reformatted copies hash to
//! the same fingerprint: NFKC compatibility normalization, whitespace runs
//! collapsed to single spaces, curly quotes mapped to straight quotes.

use unicode_normalization::UnicodeNormalization;

/// Canonicalizes raw text for fingerprinting.
///
/// Deterministic, total, and idempotent; empty input yields an empty
/// string.
///
/// # Example
///
/// ```rust
/// use briefing::stages::canonicalize;
///
/// assert_eq!(canonicalize("  Hello \u{201c}World\u{201d}\n"), "Hello \"World\"");
/// assert_eq!(canonicalize(""), "");
/// ```
#[must_use]
pub fn canonicalize(text: &str) -> String {
    let normalized: String = text.nfkc().collect();
    let collapsed = normalized
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    collapsed
        .chars()
        .map(|c| match c {
            '\u{201c}' | '\u{201d}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            other => other,
        })
        .collect()
}

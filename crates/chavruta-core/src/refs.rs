//! Canonical reference utilities
//!
//! A ref is a pointer into the Sefaria corpus, e.g. `"Yoma 85b"` or
//! `"Shulchan Arukh, Orach Chayim 263"`. Refs are whitespace-collapsed
//! and trimmed; a reader URL is derived by swapping spaces for
//! underscores and percent-encoding the rest.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Sefaria reader origin used for derived URLs
pub const SEFARIA_ORIGIN: &str = "https://www.sefaria.org";

/// Characters left bare by JavaScript's `encodeURIComponent`
///
/// Everything else — including `,`, which appears in complex refs like
/// `Shulchan Arukh, Orach Chayim 263` — is percent-encoded.
const ENCODE_URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Collapse internal whitespace runs to single spaces and trim
pub fn normalize_ref(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Derive the bilingual reader URL for a ref
pub fn ref_url(reference: &str) -> String {
    let underscored = normalize_ref(reference).replace(' ', "_");
    let encoded = utf8_percent_encode(&underscored, ENCODE_URI_COMPONENT);
    format!("{SEFARIA_ORIGIN}/{encoded}?lang=bi")
}

/// True if any character falls in the Hebrew block (U+0590–U+05FF)
pub fn contains_hebrew(s: &str) -> bool {
    s.chars().any(|c| ('\u{0590}'..='\u{05FF}').contains(&c))
}

/// Heuristic for "this query may be a citation rather than free text"
///
/// Citations carry a digit, a colon, or Hebrew letters, and stay short.
pub fn looks_like_ref(query: &str) -> bool {
    let q = query.trim();
    !q.is_empty()
        && q.chars().count() <= 120
        && (q.chars().any(|c| c.is_ascii_digit()) || q.contains(':') || contains_hebrew(q))
}

//! Text shaping for upstream payloads
//!
//! Upstream text fields may be a string, or arrays nested to any
//! depth; titles and summaries may carry inline HTML.

/// Bilingual separator line used when composing `langPref = "bi"` text
pub const BILINGUAL_SEPARATOR: &str = "\n\n— — —\n\n";

/// Flatten a nested text payload depth-first into newline-joined lines
///
/// Empty segments are dropped. Non-string leaves are ignored.
pub fn flatten_text(value: &serde_json::Value) -> String {
    let mut lines = Vec::new();
    collect_lines(value, &mut lines);
    lines.join("\n")
}

fn collect_lines(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) => {
            let cleaned = strip_html(s);
            if !cleaned.is_empty() {
                out.push(cleaned);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                collect_lines(item, out);
            }
        }
        _ => {}
    }
}

/// Remove tag runs, decode the common entities, collapse whitespace
pub fn strip_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_tag = false;
    for c in raw.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }

    let decoded = out
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First-N-characters snippet, whitespace-collapsed
pub fn snippet(text: &str, max_chars: usize) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(max_chars)
        .collect()
}

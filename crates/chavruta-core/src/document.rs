use serde::{Deserialize, Serialize};

/// A resolved text returned by the `fetch`-family tools
///
/// `id` encodes `"ref|language|version"` for corpus texts and
/// `"sheet:<numericId>"` for source sheets. For web fetches it is the
/// requested URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub text: String,
    pub url: String,
    /// Open map: categories, versions, Hebrew reference, truncation
    /// flag, content type, fetch time...
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Document {
    /// Truncate `text` to at most `max_chars` characters, recording
    /// `metadata.truncated = true` exactly when something was cut.
    pub fn truncate_text(&mut self, max_chars: usize) {
        if self.text.chars().count() > max_chars {
            self.text = self.text.chars().take(max_chars).collect();
            self.metadata
                .insert("truncated".to_owned(), serde_json::Value::Bool(true));
        }
    }
}

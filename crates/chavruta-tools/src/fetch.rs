//! `fetch`: compose full text for a search result id or sheet id

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chavruta_core::{Document, refs};
use chavruta_sefaria::text::{self, BILINGUAL_SEPARATOR};
use serde::Deserialize;
use serde_json::json;

use crate::context::ToolContext;
use crate::error::ToolError;
use crate::registry::Tool;

/// Sheets and texts both keep their payloads for ten minutes
const FETCH_TTL: Duration = Duration::from_millis(600_000);

pub struct FetchTool {
    ctx: Arc<ToolContext>,
}

#[derive(Debug, Deserialize)]
struct FetchArgs {
    id: String,
    #[serde(rename = "langPref", default = "default_lang_pref")]
    lang_pref: String,
    #[serde(rename = "maxChars", default)]
    max_chars: Option<i64>,
}

fn default_lang_pref() -> String {
    "en".to_owned()
}

impl FetchTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }

    async fn fetch_sheet(&self, id: &str, numeric: &str) -> Result<Document, ToolError> {
        let sheet = self.ctx.sefaria.sheet(numeric).await?;

        let mut parts = Vec::new();
        if let Some(ref summary) = sheet.summary {
            let cleaned = text::strip_html(summary);
            if !cleaned.is_empty() {
                parts.push(cleaned);
            }
        }
        for source in &sheet.sources {
            if let Some(ref t) = source.text {
                let en = text::strip_html(&t.en);
                if !en.is_empty() {
                    parts.push(en);
                }
                if let Some(ref he) = t.he {
                    let he = text::strip_html(he);
                    if !he.is_empty() {
                        parts.push(he);
                    }
                }
            }
            if let Some(ref outside) = source.outside_text {
                let cleaned = text::strip_html(outside);
                if !cleaned.is_empty() {
                    parts.push(cleaned);
                }
            }
            if let Some(ref comment) = source.comment {
                let cleaned = text::strip_html(comment);
                if !cleaned.is_empty() {
                    parts.push(cleaned);
                }
            }
        }

        let mut metadata = serde_json::Map::new();
        metadata.insert("contentType".to_owned(), json!("sheet"));
        metadata.insert("sourceCount".to_owned(), json!(sheet.sources.len()));

        Ok(Document {
            id: id.to_owned(),
            title: sheet.title.map(|t| text::strip_html(&t)).unwrap_or_else(|| format!("Sheet {numeric}")),
            text: parts.join("\n\n"),
            url: format!("{}/sheets/{numeric}", refs::SEFARIA_ORIGIN),
            metadata,
        })
    }

    async fn fetch_text(&self, id: &str, lang_pref: &str) -> Result<Document, ToolError> {
        // Ids arrive as "ref|language|version"; chain clients send
        // tokens like "auto|primary", which carry no version info.
        let reference = refs::normalize_ref(id.split('|').next().unwrap_or(id));
        if reference.is_empty() {
            return Err(ToolError::InvalidInput("id must start with a ref".to_owned()));
        }

        let resp = self.ctx.sefaria.texts(&reference, &["english", "hebrew"]).await?;
        let canonical = resp.canonical_ref().unwrap_or(reference.as_str()).to_owned();
        let english = resp.flattened("en");
        let hebrew = resp.flattened("he");

        let composed = match lang_pref {
            "en" => english.clone().or_else(|| hebrew.clone()),
            "he" => hebrew.clone().or_else(|| english.clone()),
            "bi" => match (&english, &hebrew) {
                (Some(en), Some(he)) => Some(format!("{en}{BILINGUAL_SEPARATOR}{he}")),
                (Some(en), None) => Some(en.clone()),
                (None, Some(he)) => Some(he.clone()),
                (None, None) => None,
            },
            _ => english.clone().or_else(|| hebrew.clone()),
        };

        let mut metadata = serde_json::Map::new();
        metadata.insert("contentType".to_owned(), json!("text"));
        if let Some(ref he_ref) = resp.he_ref {
            metadata.insert("heRef".to_owned(), json!(he_ref));
        }
        let versions: Vec<_> = resp
            .versions
            .iter()
            .map(|v| json!({"language": v.language, "versionTitle": v.version_title}))
            .collect();
        if !versions.is_empty() {
            metadata.insert("versions".to_owned(), json!(versions));
        }

        Ok(Document {
            id: id.to_owned(),
            title: canonical.clone(),
            text: composed.unwrap_or_default(),
            url: refs::ref_url(&canonical),
            metadata,
        })
    }
}

#[async_trait]
impl Tool for FetchTool {
    fn name(&self) -> &'static str {
        "fetch"
    }

    fn description(&self) -> &'static str {
        "Fetch the full text behind a search result id or sheet id"
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "id": {"type": "string", "description": "\"ref|language|version\" or \"sheet:<id>\""},
                "langPref": {"type": "string", "enum": ["en", "he", "bi"], "default": "en"},
                "maxChars": {"type": "integer", "minimum": 1},
            },
            "required": ["id"],
        })
    }

    async fn invoke(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let parsed: FetchArgs =
            serde_json::from_value(args.clone()).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
        if parsed.id.trim().is_empty() {
            return Err(ToolError::InvalidInput("id must not be empty".to_owned()));
        }
        if !matches!(parsed.lang_pref.as_str(), "en" | "he" | "bi") {
            return Err(ToolError::InvalidInput("langPref must be en, he or bi".to_owned()));
        }
        let max_chars = match parsed.max_chars {
            Some(n) if n <= 0 => {
                return Err(ToolError::InvalidInput("maxChars must be positive".to_owned()));
            }
            other => other.map(|n| n as usize),
        };

        let key = ToolContext::cache_key(self.name(), &args);
        if let Some(hit) = self.ctx.cache.get(&key) {
            return Ok(hit);
        }

        let mut document = if let Some(numeric) = parsed.id.strip_prefix("sheet:") {
            let numeric = numeric.trim();
            if numeric.is_empty() || !numeric.chars().all(|c| c.is_ascii_digit()) {
                return Err(ToolError::InvalidInput("sheet id must be numeric".to_owned()));
            }
            self.fetch_sheet(&parsed.id, numeric).await?
        } else {
            self.fetch_text(&parsed.id, &parsed.lang_pref).await?
        };

        if let Some(max) = max_chars {
            document.truncate_text(max);
        }

        let out = serde_json::to_value(&document).map_err(|e| ToolError::Internal(e.to_string()))?;
        self.ctx.cache.set(&key, out.clone(), FETCH_TTL);
        Ok(out)
    }
}

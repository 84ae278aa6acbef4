//! `find_refs`: locate citations inside free text

use std::sync::Arc;

use async_trait::async_trait;
use chavruta_core::refs;
use chavruta_sefaria::resolver;
use chavruta_sefaria::types::extract_ref_matches;
use serde::Deserialize;
use serde_json::json;

use crate::context::ToolContext;
use crate::error::ToolError;
use crate::registry::Tool;

/// Rows returned when falling back to phrase search
const FALLBACK_ROWS: usize = 5;

pub struct FindRefsTool {
    ctx: Arc<ToolContext>,
}

#[derive(Debug, Deserialize)]
struct FindRefsArgs {
    text: String,
    #[serde(default)]
    lang: Option<String>,
    #[serde(rename = "return_text", default)]
    return_text: bool,
}

impl FindRefsTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for FindRefsTool {
    fn name(&self) -> &'static str {
        "find_refs"
    }

    fn description(&self) -> &'static str {
        "Find citations mentioned inside a block of free text"
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "text": {"type": "string"},
                "lang": {"type": "string", "enum": ["en", "he"]},
                "return_text": {"type": "boolean", "default": false},
            },
            "required": ["text"],
        })
    }

    async fn invoke(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let parsed: FindRefsArgs =
            serde_json::from_value(args.clone()).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
        if parsed.text.trim().is_empty() {
            return Err(ToolError::InvalidInput("text must not be empty".to_owned()));
        }

        let key = ToolContext::cache_key(self.name(), &args);
        if let Some(hit) = self.ctx.cache.get(&key) {
            return Ok(hit);
        }

        let mut metadata = serde_json::Map::new();
        let mut matches: Vec<serde_json::Value> = Vec::new();

        match self.ctx.sefaria.find_refs(&parsed.text, parsed.lang.as_deref()).await {
            Ok(found) => {
                for m in extract_ref_matches(&found) {
                    let mut row = serde_json::Map::new();
                    row.insert("ref".to_owned(), json!(m.reference));
                    row.insert("url".to_owned(), json!(refs::ref_url(&m.reference)));
                    if let Some(he) = m.he_ref {
                        row.insert("heRef".to_owned(), json!(he));
                    }
                    if parsed.return_text
                        && let Some(t) = m.text
                    {
                        row.insert("text".to_owned(), json!(t));
                    }
                    if let Some(start) = m.start {
                        row.insert("start".to_owned(), json!(start));
                    }
                    if let Some(end) = m.end {
                        row.insert("end".to_owned(), json!(end));
                    }
                    matches.push(serde_json::Value::Object(row));
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "find-refs failed, falling back to phrase search");
                metadata.insert("findRefsError".to_owned(), json!(e.to_string()));
            }
        }

        if matches.is_empty() {
            let hits = resolver::phrase_search(&self.ctx.sefaria, &parsed.text, FALLBACK_ROWS)
                .await
                .unwrap_or_default();
            if !hits.is_empty() {
                metadata.insert("fallbackUsed".to_owned(), json!("search"));
                for hit in hits {
                    let mut row = serde_json::Map::new();
                    row.insert("ref".to_owned(), json!(hit.reference));
                    row.insert("url".to_owned(), json!(hit.url));
                    if parsed.return_text
                        && let Some(t) = hit.text
                    {
                        row.insert("text".to_owned(), json!(t));
                    }
                    matches.push(serde_json::Value::Object(row));
                }
            }
        }

        let out = json!({"matches": matches, "metadata": metadata});
        self.ctx.cache.set(&key, out.clone(), self.ctx.default_ttl);
        Ok(out)
    }
}

//! `search`: rank corpus hits for a query, cheapest path first

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chavruta_core::refs;
use chavruta_sefaria::resolver;
use serde::Deserialize;
use serde_json::json;

use crate::context::ToolContext;
use crate::error::ToolError;
use crate::registry::Tool;

const MAX_SIZE: i64 = 25;
const DEFAULT_SIZE: i64 = 10;

pub struct SearchTool {
    ctx: Arc<ToolContext>,
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default = "default_size")]
    size: i64,
    #[serde(default)]
    lang: Option<String>,
}

const fn default_size() -> i64 {
    DEFAULT_SIZE
}

impl SearchTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }

    /// Phrase match ranked by composition date, then canonical order
    fn phrase_body(query: &str, size: i64) -> serde_json::Value {
        json!({
            "size": size,
            "query": {"match_phrase": {"naive_lemmatizer": {"query": query, "slop": 10}}},
            "sort": [{"comp_date": {}}, {"order": {}}],
            "highlight": {"fields": {"naive_lemmatizer": {}}},
        })
    }

    fn exact_body(query: &str, size: i64) -> serde_json::Value {
        json!({
            "size": size,
            "query": {"match_phrase": {"exact": {"query": query}}},
        })
    }

    fn combined_body(query: &str, size: i64) -> serde_json::Value {
        json!({
            "size": size,
            "query": {"bool": {"should": [
                {"match_phrase": {"naive_lemmatizer": {"query": query, "slop": 10}}},
                {"match_phrase": {"exact": {"query": query}}},
            ]}},
        })
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &'static str {
        "search"
    }

    fn description(&self) -> &'static str {
        "Search the Sefaria library for sources matching a query or citation"
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Citation or free-text query"},
                "size": {"type": "integer", "minimum": 1, "maximum": MAX_SIZE, "default": DEFAULT_SIZE},
                "lang": {"type": "string", "enum": ["en", "he"]},
            },
            "required": ["query"],
        })
    }

    fn output_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "results": {"type": "array", "items": {"type": "object", "properties": {
                    "id": {"type": "string"},
                    "title": {"type": "string"},
                    "url": {"type": "string"},
                }}},
            },
            "required": ["results"],
        })
    }

    async fn invoke(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let parsed: SearchArgs =
            serde_json::from_value(args.clone()).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
        if parsed.query.trim().is_empty() {
            return Err(ToolError::InvalidInput("query must not be empty".to_owned()));
        }
        if !(1..=MAX_SIZE).contains(&parsed.size) {
            return Err(ToolError::InvalidInput(format!(
                "size must be between 1 and {MAX_SIZE}"
            )));
        }

        let key = ToolContext::cache_key(self.name(), &args);
        if let Some(hit) = self.ctx.cache.get(&key) {
            return Ok(hit);
        }

        let query = refs::normalize_ref(&parsed.query);
        let lang = parsed.lang.as_deref().unwrap_or("en");
        let size = parsed.size as usize;
        let hebrew = refs::contains_hebrew(&query);

        let mut seen = HashSet::new();
        let mut results: Vec<serde_json::Value> = Vec::new();
        let mut push = |reference: &str, seen: &mut HashSet<String>, results: &mut Vec<serde_json::Value>| {
            if seen.insert(reference.to_owned()) {
                results.push(json!({
                    "id": format!("{reference}|{lang}|primary"),
                    "title": reference,
                    "url": refs::ref_url(reference),
                }));
            }
        };

        // Exact-citation fast path
        if refs::looks_like_ref(&query) {
            if let Ok(resp) = self.ctx.sefaria.texts(&query, &["english"]).await
                && let Some(canonical) = resp.canonical_ref()
            {
                push(canonical, &mut seen, &mut results);
            }
        }

        if results.is_empty() {
            let mut hits = self.ctx.sefaria.search(&Self::phrase_body(&query, parsed.size)).await?.hits.hits;
            if hits.is_empty() && hebrew {
                hits = self.ctx.sefaria.search(&Self::exact_body(&query, parsed.size)).await?.hits.hits;
            }
            if hits.is_empty() && !hebrew {
                hits = self
                    .ctx
                    .sefaria
                    .search(&Self::combined_body(&query, parsed.size))
                    .await?
                    .hits
                    .hits;
            }
            for hit in &hits {
                if let Some(reference) = hit.reference() {
                    push(&reference, &mut seen, &mut results);
                }
            }
        }

        // Citation extraction as a last search path
        if results.is_empty()
            && let Ok(found) = self.ctx.sefaria.find_refs(&query, Some(lang)).await
        {
            for m in chavruta_sefaria::types::extract_ref_matches(&found) {
                push(&m.reference, &mut seen, &mut results);
            }
        }

        // Alias table backstop for well-known phrases
        if results.is_empty()
            && let Some(aliased) = resolver::alias(&query)
        {
            push(&aliased, &mut seen, &mut results);
        }

        results.truncate(size);
        let out = json!({"results": results});
        self.ctx.cache.set(&key, out.clone(), self.ctx.default_ttl);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bodies_carry_expected_fields() {
        let body = SearchTool::phrase_body("pikuach nefesh", 5);
        assert_eq!(body["size"], 5);
        assert_eq!(body["query"]["match_phrase"]["naive_lemmatizer"]["slop"], 10);
        assert!(body["sort"].is_array());

        let body = SearchTool::combined_body("candles", 3);
        assert_eq!(body["query"]["bool"]["should"].as_array().map(Vec::len), Some(2));
    }
}

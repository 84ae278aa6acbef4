//! Topic-centric tools: `topics_search` and `topic_sheet_curator`

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

// ---------------------------------------------------------------- //
// topics_search
// ---------------------------------------------------------------- //

const TOPICS_SEARCH_SIZE: usize = 8;

pub struct TopicsSearchTool {
    ctx: Arc<ToolContext>,
}

#[derive(Debug, Deserialize)]
struct TopicsSearchArgs {
    topic: String,
}

impl TopicsSearchTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for TopicsSearchTool {
    fn name(&self) -> &'static str {
        "topics_search"
    }

    fn description(&self) -> &'static str {
        "Find the sources most associated with a topic phrase"
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {"topic": {"type": "string"}},
            "required": ["topic"],
        })
    }

    async fn invoke(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let parsed: TopicsSearchArgs =
            serde_json::from_value(args.clone()).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
        let topic = refs::normalize_ref(&parsed.topic);
        if topic.is_empty() {
            return Err(ToolError::InvalidInput("topic must not be empty".to_owned()));
        }

        let key = ToolContext::cache_key(self.name(), &args);
        if let Some(hit) = self.ctx.cache.get(&key) {
            return Ok(hit);
        }

        let body = json!({
            "size": TOPICS_SEARCH_SIZE,
            "query": {"bool": {"should": [
                {"match_phrase": {"naive_lemmatizer": {"query": topic, "slop": 8}}},
                {"match_phrase": {"exact": {"query": topic}}},
            ]}},
            "highlight": {"fields": {"naive_lemmatizer": {}}},
        });

        let response = self.ctx.sefaria.search(&body).await?;
        let results: Vec<_> = response
            .hits
            .hits
            .iter()
            .filter_map(|hit| {
                let reference = hit.reference()?;
                let mut row = serde_json::Map::new();
                row.insert("ref".to_owned(), json!(reference));
                row.insert("title".to_owned(), json!(reference));
                row.insert("url".to_owned(), json!(refs::ref_url(&reference)));
                if let Some(snippet) = hit.highlight_text() {
                    row.insert("snippet".to_owned(), json!(snippet));
                }
                Some(serde_json::Value::Object(row))
            })
            .take(TOPICS_SEARCH_SIZE)
            .collect();

        let out = json!({"results": results});
        self.ctx.cache.set(&key, out.clone(), self.ctx.default_ttl);
        Ok(out)
    }
}

// ---------------------------------------------------------------- //
// topic_sheet_curator
// ---------------------------------------------------------------- //

const MAX_CURATED_SHEETS: i64 = 15;
const DEFAULT_CURATED_SHEETS: i64 = 8;
/// Refs sampled from phrase search when the topic page runs dry
const FALLBACK_SEED_REFS: usize = 5;

pub struct TopicSheetCuratorTool {
    ctx: Arc<ToolContext>,
}

#[derive(Debug, Deserialize)]
struct CuratorArgs {
    topic: String,
    #[serde(rename = "maxSheets", default = "default_curated_sheets")]
    max_sheets: i64,
}

const fn default_curated_sheets() -> i64 {
    DEFAULT_CURATED_SHEETS
}

impl TopicSheetCuratorTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }

    /// Slug spellings tried against the topics API, in order
    fn slug_candidates(topic: &str) -> Vec<String> {
        let lowered = topic.to_lowercase();
        let mut candidates = vec![
            topic.to_owned(),
            lowered.clone(),
            lowered.replace(' ', "-"),
            lowered.replace(' ', "_"),
        ];
        let mut seen = HashSet::new();
        candidates.retain(|c| seen.insert(c.clone()));
        candidates
    }

    /// Numeric sheet id hiding in a topic ref like `"Sheet 81632"`
    fn sheet_id_from_ref(reference: &str) -> Option<String> {
        let digits: String = reference.chars().filter(char::is_ascii_digit).collect();
        (!digits.is_empty()).then_some(digits)
    }
}

#[async_trait]
impl Tool for TopicSheetCuratorTool {
    fn name(&self) -> &'static str {
        "topic_sheet_curator"
    }

    fn description(&self) -> &'static str {
        "Collect community source sheets for a topic, with search fallback"
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "topic": {"type": "string"},
                "maxSheets": {"type": "integer", "minimum": 1, "maximum": MAX_CURATED_SHEETS,
                              "default": DEFAULT_CURATED_SHEETS},
            },
            "required": ["topic"],
        })
    }

    async fn invoke(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let parsed: CuratorArgs =
            serde_json::from_value(args.clone()).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
        let topic = refs::normalize_ref(&parsed.topic);
        if topic.is_empty() {
            return Err(ToolError::InvalidInput("topic must not be empty".to_owned()));
        }
        if !(1..=MAX_CURATED_SHEETS).contains(&parsed.max_sheets) {
            return Err(ToolError::InvalidInput(format!(
                "maxSheets must be between 1 and {MAX_CURATED_SHEETS}"
            )));
        }
        let max_sheets = parsed.max_sheets as usize;

        let key = ToolContext::cache_key(self.name(), &args);
        if let Some(hit) = self.ctx.cache.get(&key) {
            return Ok(hit);
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut sheets: Vec<serde_json::Value> = Vec::new();
        let mut matched_slug: Option<String> = None;

        for candidate in Self::slug_candidates(&topic) {
            let Ok(topic_page) = self.ctx.sefaria.topic(&candidate).await else {
                continue;
            };
            let sheet_ids: Vec<String> = topic_page
                .refs
                .iter()
                .filter(|r| r.is_sheet)
                .filter_map(|r| r.reference.as_deref().and_then(Self::sheet_id_from_ref))
                .collect();
            if sheet_ids.is_empty() {
                continue;
            }

            matched_slug = topic_page.slug.or(Some(candidate));
            for id in sheet_ids {
                if sheets.len() >= max_sheets {
                    break;
                }
                if !seen.insert(id.clone()) {
                    continue;
                }
                match self.ctx.sefaria.sheet(&id).await {
                    Ok(sheet) => sheets.push(json!({
                        "id": id,
                        "title": sheet.title,
                        "summary": sheet.summary,
                        "url": format!("{}/sheets/{id}", refs::SEFARIA_ORIGIN),
                        "sourceCount": sheet.sources.len(),
                    })),
                    Err(e) => {
                        tracing::debug!(sheet = %id, error = %e, "sheet metadata unavailable");
                    }
                }
            }
            break;
        }

        // Thin harvest: widen through search hits and their related sheets
        let quota = std::cmp::max(3, max_sheets / 2);
        let mut fallback_used = false;
        if sheets.len() < quota {
            fallback_used = true;
            let hits = resolver::phrase_search(&self.ctx.sefaria, &topic, FALLBACK_SEED_REFS)
                .await
                .unwrap_or_default();
            'outer: for hit in hits {
                let Ok(related) = self.ctx.sefaria.related(&hit.reference).await else {
                    continue;
                };
                for sheet in related.sheets {
                    if sheets.len() >= max_sheets {
                        break 'outer;
                    }
                    let Some(id) = sheet.id else { continue };
                    if !seen.insert(id.to_string()) {
                        continue;
                    }
                    sheets.push(json!({
                        "id": id.to_string(),
                        "title": sheet.title,
                        "url": sheet
                            .sheet_url
                            .unwrap_or_else(|| format!("{}/sheets/{id}", refs::SEFARIA_ORIGIN)),
                        "views": sheet.views,
                    }));
                }
            }
        }

        let mut metadata = serde_json::Map::new();
        metadata.insert("count".to_owned(), json!(sheets.len()));
        if fallback_used {
            metadata.insert("fallbackUsed".to_owned(), json!(true));
        }

        let out = json!({
            "topic": topic,
            "slug": matched_slug,
            "sheets": sheets,
            "metadata": metadata,
        });
        self.ctx.cache.set(&key, out.clone(), self.ctx.default_ttl);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_candidates_cover_spellings() {
        let candidates = TopicSheetCuratorTool::slug_candidates("Pikuach Nefesh");
        assert_eq!(
            candidates,
            vec!["Pikuach Nefesh", "pikuach nefesh", "pikuach-nefesh", "pikuach_nefesh"]
        );

        // Already-lowercase single words collapse to one candidate
        assert_eq!(TopicSheetCuratorTool::slug_candidates("shabbat"), vec!["shabbat"]);
    }

    #[test]
    fn sheet_id_extraction() {
        assert_eq!(TopicSheetCuratorTool::sheet_id_from_ref("Sheet 81632").as_deref(), Some("81632"));
        assert_eq!(TopicSheetCuratorTool::sheet_id_from_ref("no digits here"), None);
    }
}

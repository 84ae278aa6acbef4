//! `sugya_explorer`: build a ranked neighborhood around one passage

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chavruta_core::refs;
use chavruta_sefaria::resolver;
use chavruta_sefaria::text::{self, BILINGUAL_SEPARATOR};
use chavruta_sefaria::types::{RelatedResponse, RelatedSheet, RelatedTopic};
use serde::Deserialize;
use serde_json::json;

use crate::context::ToolContext;
use crate::error::ToolError;
use crate::registry::Tool;

const SUGYA_TTL: Duration = Duration::from_millis(180_000);

/// Link-consideration caps; Shulchan Arukh refs link so broadly that
/// `related` is skipped for them entirely
const LINK_CAP: usize = 800;
const SHULCHAN_ARUKH_LINK_CAP: usize = 300;

const MAX_TEXT_CHARS: i64 = 8_000;
const DEFAULT_TEXT_CHARS: i64 = 2_000;
const MAX_PER_CATEGORY: i64 = 15;
const DEFAULT_PER_CATEGORY: i64 = 5;
const MAX_SHEETS: i64 = 20;
const DEFAULT_SHEETS: i64 = 10;
const MAX_TOPICS: i64 = 20;
const DEFAULT_TOPICS: i64 = 10;

const SNIPPET_CHARS: usize = 400;
const FALLBACK_SEARCH_ROWS: usize = 10;

pub struct SugyaExplorerTool {
    ctx: Arc<ToolContext>,
}

#[derive(Debug, Deserialize)]
struct SugyaArgs {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(rename = "includeText", default)]
    include_text: bool,
    #[serde(rename = "maxTextChars", default = "default_text_chars")]
    max_text_chars: i64,
    #[serde(rename = "maxPerCategory", default = "default_per_category")]
    max_per_category: i64,
    #[serde(rename = "maxSheets", default = "default_sheets")]
    max_sheets: i64,
    #[serde(rename = "maxTopics", default = "default_topics")]
    max_topics: i64,
}

const fn default_text_chars() -> i64 {
    DEFAULT_TEXT_CHARS
}
const fn default_per_category() -> i64 {
    DEFAULT_PER_CATEGORY
}
const fn default_sheets() -> i64 {
    DEFAULT_SHEETS
}
const fn default_topics() -> i64 {
    DEFAULT_TOPICS
}

impl SugyaExplorerTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }

    fn is_shulchan_arukh(reference: &str) -> bool {
        reference.to_lowercase().contains("shulchan arukh")
    }

    /// Group capped links by category, ranked by score within each
    fn build_categories(related: &RelatedResponse, cap: usize, per_category: usize) -> Vec<serde_json::Value> {
        let mut grouped: BTreeMap<String, Vec<&chavruta_sefaria::types::RelatedLink>> = BTreeMap::new();
        for link in related.links.iter().take(cap) {
            if link.best_ref().is_none() {
                continue;
            }
            let category = link.category.clone().unwrap_or_else(|| "Other".to_owned());
            grouped.entry(category).or_default().push(link);
        }

        grouped
            .into_iter()
            .map(|(category, mut links)| {
                let total = links.len();
                links.sort_by(|a, b| {
                    b.score().partial_cmp(&a.score()).unwrap_or(std::cmp::Ordering::Equal)
                });
                let top: Vec<_> = links
                    .into_iter()
                    .take(per_category)
                    .map(|link| {
                        let target = link.best_ref().unwrap_or_default();
                        let title = link
                            .source_ref
                            .clone()
                            .or_else(|| link.collective_title.as_ref().map(|t| t.en.clone()))
                            .unwrap_or_else(|| target.to_owned());
                        let mut entry = serde_json::Map::new();
                        entry.insert("ref".to_owned(), json!(target));
                        entry.insert("title".to_owned(), json!(title));
                        entry.insert("url".to_owned(), json!(refs::ref_url(target)));
                        if let Some(ref he) = link.source_he_ref {
                            entry.insert("heRef".to_owned(), json!(he));
                        }
                        if let Some(ref link_type) = link.link_type {
                            entry.insert("type".to_owned(), json!(link_type));
                        }
                        entry.insert("score".to_owned(), json!(link.score()));
                        serde_json::Value::Object(entry)
                    })
                    .collect();
                json!({"category": category, "totalLinks": total, "links": top})
            })
            .collect()
    }

    fn dedup_sheets(sheets: &[RelatedSheet], cap: usize) -> Vec<serde_json::Value> {
        let mut seen = HashSet::new();
        sheets
            .iter()
            .filter_map(|sheet| {
                let id = sheet.id?;
                if !seen.insert(id) {
                    return None;
                }
                Some(json!({
                    "id": id,
                    "title": sheet.title.as_deref().map(text::strip_html),
                    "url": sheet
                        .sheet_url
                        .clone()
                        .unwrap_or_else(|| format!("{}/sheets/{id}", refs::SEFARIA_ORIGIN)),
                    "views": sheet.views,
                }))
            })
            .take(cap)
            .collect()
    }

    fn dedup_topics(topics: &[RelatedTopic], cap: usize) -> Vec<serde_json::Value> {
        let mut seen = HashSet::new();
        topics
            .iter()
            .filter_map(|topic| {
                let slug = topic.slug.clone()?;
                if !seen.insert(slug.clone()) {
                    return None;
                }
                let title = topic.title.as_ref().map(|t| t.en.clone()).filter(|t| !t.is_empty());
                Some(json!({"slug": slug, "title": title}))
            })
            .take(cap)
            .collect()
    }
}

#[async_trait]
impl Tool for SugyaExplorerTool {
    fn name(&self) -> &'static str {
        "sugya_explorer"
    }

    fn description(&self) -> &'static str {
        "Explore a passage: ranked links by category, sheets, topics and text"
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "ref": {"type": "string", "description": "Citation or phrase naming the passage"},
                "includeText": {"type": "boolean", "default": false},
                "maxTextChars": {"type": "integer", "minimum": 1, "maximum": MAX_TEXT_CHARS,
                                 "default": DEFAULT_TEXT_CHARS},
                "maxPerCategory": {"type": "integer", "minimum": 1, "maximum": MAX_PER_CATEGORY,
                                   "default": DEFAULT_PER_CATEGORY},
                "maxSheets": {"type": "integer", "minimum": 0, "maximum": MAX_SHEETS, "default": DEFAULT_SHEETS},
                "maxTopics": {"type": "integer", "minimum": 0, "maximum": MAX_TOPICS, "default": DEFAULT_TOPICS},
            },
            "required": ["ref"],
        })
    }

    async fn invoke(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let parsed: SugyaArgs =
            serde_json::from_value(args.clone()).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
        let input = refs::normalize_ref(&parsed.reference);
        if input.is_empty() {
            return Err(ToolError::InvalidInput("ref must not be empty".to_owned()));
        }
        if !(1..=MAX_TEXT_CHARS).contains(&parsed.max_text_chars) {
            return Err(ToolError::InvalidInput(format!(
                "maxTextChars must be between 1 and {MAX_TEXT_CHARS}"
            )));
        }
        if !(1..=MAX_PER_CATEGORY).contains(&parsed.max_per_category) {
            return Err(ToolError::InvalidInput(format!(
                "maxPerCategory must be between 1 and {MAX_PER_CATEGORY}"
            )));
        }
        if !(0..=MAX_SHEETS).contains(&parsed.max_sheets) {
            return Err(ToolError::InvalidInput(format!("maxSheets must be between 0 and {MAX_SHEETS}")));
        }
        if !(0..=MAX_TOPICS).contains(&parsed.max_topics) {
            return Err(ToolError::InvalidInput(format!("maxTopics must be between 0 and {MAX_TOPICS}")));
        }

        let key = ToolContext::cache_key(self.name(), &args);
        if let Some(hit) = self.ctx.cache.get(&key) {
            return Ok(hit);
        }

        let seed = resolver::resolve(&self.ctx.sefaria, &input).await.unwrap_or_else(|| input.clone());

        // Shulchan Arukh refs: related is known to be overly broad and
        // slow, so the link expansion is skipped outright.
        let skip_related = Self::is_shulchan_arukh(&seed);
        let link_cap = if skip_related { SHULCHAN_ARUKH_LINK_CAP } else { LINK_CAP };

        let related = if skip_related {
            RelatedResponse::default()
        } else {
            match self.ctx.sefaria.related(&seed).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(seed = %seed, error = %e, "related expansion unavailable");
                    RelatedResponse::default()
                }
            }
        };

        let mut he_ref: Option<String> = None;
        let mut text_block: Option<String> = None;
        let mut english_snippet = String::new();
        let mut hebrew_snippet = String::new();
        let mut truncated = false;

        if parsed.include_text {
            match self.ctx.sefaria.texts(&seed, &["english", "hebrew"]).await {
                Ok(resp) => {
                    he_ref = resp.he_ref.clone();
                    let english = resp.flattened("en").unwrap_or_default();
                    let hebrew = resp.flattened("he").unwrap_or_default();
                    english_snippet = text::snippet(&english, SNIPPET_CHARS);
                    hebrew_snippet = text::snippet(&hebrew, SNIPPET_CHARS);

                    let mut combined = match (english.is_empty(), hebrew.is_empty()) {
                        (false, false) => format!("{english}{BILINGUAL_SEPARATOR}{hebrew}"),
                        (false, true) => english,
                        (true, false) => hebrew,
                        (true, true) => String::new(),
                    };
                    let max = parsed.max_text_chars as usize;
                    if combined.chars().count() > max {
                        combined = combined.chars().take(max).collect();
                        truncated = true;
                    }
                    if !combined.is_empty() {
                        text_block = Some(combined);
                    }
                }
                Err(e) => {
                    tracing::warn!(seed = %seed, error = %e, "seed text unavailable");
                }
            }
        }

        let mut categories =
            Self::build_categories(&related, link_cap, parsed.max_per_category as usize);

        // No grouped links at all: seed a synthetic category from the
        // phrase-search fallback so the caller still gets somewhere to go
        if categories.is_empty() {
            let hits = resolver::phrase_search(&self.ctx.sefaria, &input, FALLBACK_SEARCH_ROWS)
                .await
                .unwrap_or_default();
            if !hits.is_empty() {
                let links: Vec<_> = hits
                    .iter()
                    .take(parsed.max_per_category as usize)
                    .map(|hit| {
                        json!({
                            "ref": hit.reference,
                            "title": hit.reference,
                            "url": hit.url,
                            "score": 0.0,
                        })
                    })
                    .collect();
                categories.push(json!({
                    "category": "Search Matches",
                    "totalLinks": hits.len(),
                    "links": links,
                }));
            }
        }

        let sheets = Self::dedup_sheets(&related.sheets, parsed.max_sheets as usize);
        let topics = Self::dedup_topics(&related.topics, parsed.max_topics as usize);

        let mut metadata = serde_json::Map::new();
        metadata.insert("totalLinkCount".to_owned(), json!(related.links.len()));
        metadata.insert("sheetCount".to_owned(), json!(sheets.len()));
        metadata.insert("topicCount".to_owned(), json!(topics.len()));
        metadata.insert("englishSnippet".to_owned(), json!(english_snippet));
        metadata.insert("hebrewSnippet".to_owned(), json!(hebrew_snippet));
        if truncated {
            metadata.insert("truncated".to_owned(), json!(true));
        }
        if seed != input {
            metadata.insert("resolvedFrom".to_owned(), json!(input));
        }

        let out = json!({
            "ref": seed,
            "heRef": he_ref,
            "url": refs::ref_url(&seed),
            "title": seed,
            "categories": categories,
            "sheets": sheets,
            "topics": topics,
            "text": text_block,
            "metadata": metadata,
        });
        self.ctx.cache.set(&key, out.clone(), SUGYA_TTL);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chavruta_sefaria::types::RelatedLink;

    fn link(category: &str, source_ref: &str, pr: f64) -> RelatedLink {
        RelatedLink {
            source_ref: Some(source_ref.to_owned()),
            category: Some(category.to_owned()),
            pr,
            ..Default::default()
        }
    }

    #[test]
    fn detects_shulchan_arukh_case_insensitively() {
        assert!(SugyaExplorerTool::is_shulchan_arukh("Shulchan Arukh, Orach Chayim 263"));
        assert!(SugyaExplorerTool::is_shulchan_arukh("shulchan arukh, yoreh de'ah 87"));
        assert!(!SugyaExplorerTool::is_shulchan_arukh("Yoma 85b"));
    }

    #[test]
    fn categories_rank_by_score_and_cap() {
        let related = RelatedResponse {
            links: vec![
                link("Commentary", "Rashi on Yoma 85b", 1.0),
                link("Commentary", "Tosafot on Yoma 85b", 5.0),
                link("Commentary", "Ritva on Yoma 85b", 3.0),
                link("Halakhah", "Mishneh Torah, Shabbat 2:1", 2.0),
            ],
            ..Default::default()
        };
        let categories = SugyaExplorerTool::build_categories(&related, 800, 2);
        assert_eq!(categories.len(), 2);

        let commentary = categories.iter().find(|c| c["category"] == "Commentary").unwrap();
        let links = commentary["links"].as_array().unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0]["ref"], "Tosafot on Yoma 85b");
        assert_eq!(links[1]["ref"], "Ritva on Yoma 85b");
        assert_eq!(commentary["totalLinks"], 3);
    }

    #[test]
    fn link_cap_bounds_consideration() {
        let related = RelatedResponse {
            links: (0..10).map(|i| link("Commentary", &format!("C{i} on X"), i as f64)).collect(),
            ..Default::default()
        };
        let categories = SugyaExplorerTool::build_categories(&related, 4, 15);
        // Only the first four links were considered at all
        assert_eq!(categories[0]["totalLinks"], 4);
    }

    #[test]
    fn sheets_dedup_by_id() {
        let sheets = vec![
            RelatedSheet { id: Some(1), title: Some("A".into()), ..Default::default() },
            RelatedSheet { id: Some(1), title: Some("A again".into()), ..Default::default() },
            RelatedSheet { id: Some(2), title: Some("B".into()), ..Default::default() },
            RelatedSheet { id: None, ..Default::default() },
        ];
        let out = SugyaExplorerTool::dedup_sheets(&sheets, 10);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn topics_dedup_by_slug() {
        let topics = vec![
            RelatedTopic { slug: Some("shabbat".into()), ..Default::default() },
            RelatedTopic { slug: Some("shabbat".into()), ..Default::default() },
            RelatedTopic { slug: Some("pikuach-nefesh".into()), ..Default::default() },
        ];
        let out = SugyaExplorerTool::dedup_topics(&topics, 10);
        assert_eq!(out.len(), 2);
    }
}

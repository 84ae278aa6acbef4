//! Tools built on `related/{ref}` and multi-version text queries:
//! `get_commentaries`, `compare_versions`, `insight_layers`

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chavruta_core::refs;
use chavruta_sefaria::text::{self, BILINGUAL_SEPARATOR};
use chavruta_sefaria::types::RelatedLink;
use serde::Deserialize;
use serde_json::json;

use crate::context::ToolContext;
use crate::error::ToolError;
use crate::registry::Tool;

// ---------------------------------------------------------------- //
// get_commentaries
// ---------------------------------------------------------------- //

pub struct GetCommentariesTool {
    ctx: Arc<ToolContext>,
}

#[derive(Debug, Deserialize)]
struct RefArgs {
    #[serde(rename = "ref")]
    reference: String,
}

impl GetCommentariesTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for GetCommentariesTool {
    fn name(&self) -> &'static str {
        "get_commentaries"
    }

    fn description(&self) -> &'static str {
        "List works linked to a ref, commentaries first among them"
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {"ref": {"type": "string"}},
            "required": ["ref"],
        })
    }

    async fn invoke(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let parsed: RefArgs =
            serde_json::from_value(args.clone()).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
        let reference = refs::normalize_ref(&parsed.reference);
        if reference.is_empty() {
            return Err(ToolError::InvalidInput("ref must not be empty".to_owned()));
        }

        let key = ToolContext::cache_key(self.name(), &args);
        if let Some(hit) = self.ctx.cache.get(&key) {
            return Ok(hit);
        }

        let related = self.ctx.sefaria.related(&reference).await?;
        let commentaries: Vec<_> = related
            .links
            .iter()
            .filter_map(|link| {
                let target = link.best_ref()?;
                let title = link
                    .source_ref
                    .clone()
                    .or_else(|| link.category.clone())
                    .unwrap_or_else(|| target.to_owned());
                Some(json!({
                    "ref": target,
                    "title": title,
                    "url": refs::ref_url(target),
                }))
            })
            .collect();

        let out = json!({"ref": reference, "commentaries": commentaries});
        self.ctx.cache.set(&key, out.clone(), self.ctx.default_ttl);
        Ok(out)
    }
}

// ---------------------------------------------------------------- //
// compare_versions
// ---------------------------------------------------------------- //

pub struct CompareVersionsTool {
    ctx: Arc<ToolContext>,
}

#[derive(Debug, Deserialize)]
struct CompareVersionsArgs {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(default)]
    versions: Option<Vec<String>>,
    #[serde(default)]
    languages: Option<Vec<String>>,
    #[serde(rename = "maxChars", default)]
    max_chars: Option<i64>,
}

impl CompareVersionsTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for CompareVersionsTool {
    fn name(&self) -> &'static str {
        "compare_versions"
    }

    fn description(&self) -> &'static str {
        "Fetch a ref in several versions or languages side by side"
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "ref": {"type": "string"},
                "versions": {"type": "array", "items": {"type": "string"}},
                "languages": {"type": "array", "items": {"type": "string", "enum": ["en", "he"]}},
                "maxChars": {"type": "integer", "minimum": 1},
            },
            "required": ["ref"],
        })
    }

    async fn invoke(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let parsed: CompareVersionsArgs =
            serde_json::from_value(args.clone()).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
        let reference = refs::normalize_ref(&parsed.reference);
        if reference.is_empty() {
            return Err(ToolError::InvalidInput("ref must not be empty".to_owned()));
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

        // Explicit versions win; otherwise languages map onto the
        // upstream's named version selectors.
        let selectors: Vec<String> = if let Some(versions) = parsed.versions.filter(|v| !v.is_empty()) {
            versions
        } else if let Some(languages) = parsed.languages.filter(|l| !l.is_empty()) {
            languages
                .iter()
                .map(|l| match l.as_str() {
                    "he" => "hebrew".to_owned(),
                    _ => "english".to_owned(),
                })
                .collect()
        } else {
            vec!["english".to_owned(), "hebrew".to_owned()]
        };
        let selector_refs: Vec<&str> = selectors.iter().map(String::as_str).collect();

        let resp = self.ctx.sefaria.texts(&reference, &selector_refs).await?;

        let mut any_truncated = false;
        let items: Vec<_> = resp
            .versions
            .iter()
            .filter_map(|v| {
                let mut flattened = text::flatten_text(&v.text);
                if flattened.is_empty() {
                    return None;
                }
                if let Some(max) = max_chars
                    && flattened.chars().count() > max
                {
                    flattened = flattened.chars().take(max).collect();
                    any_truncated = true;
                }
                Some(json!({
                    "language": v.language,
                    "versionTitle": v.version_title,
                    "text": flattened,
                }))
            })
            .collect();

        let mut metadata = serde_json::Map::new();
        metadata.insert("versionCount".to_owned(), json!(items.len()));
        if any_truncated {
            metadata.insert("truncated".to_owned(), json!(true));
        }

        let out = json!({"ref": reference, "items": items, "metadata": metadata});
        self.ctx.cache.set(&key, out.clone(), self.ctx.default_ttl);
        Ok(out)
    }
}

// ---------------------------------------------------------------- //
// insight_layers
// ---------------------------------------------------------------- //

/// Default commentator panel, in presentation order
const DEFAULT_COMMENTATORS: &[&str] = &["Rashi", "Ibn Ezra", "Ramban", "Sforno"];

/// Extra commentators appended (by score) when the caller names none
const EXTRA_COMMENTATORS: usize = 2;

const MAX_INSIGHT_CHARS: i64 = 3_000;
const DEFAULT_INSIGHT_CHARS: i64 = 1_200;

/// Words too common to count as themes
const STOPWORDS: &[&str] = &[
    "and", "the", "that", "this", "with", "for", "from", "was", "are", "not", "but", "his", "her",
    "they", "them", "who", "which", "what", "when", "there", "their", "has", "have", "had", "one",
    "all", "also", "will", "shall", "said", "says", "upon", "into", "out", "because", "thus",
    "therefore", "these", "those", "you", "your",
];

pub struct InsightLayersTool {
    ctx: Arc<ToolContext>,
}

#[derive(Debug, Deserialize)]
struct InsightLayersArgs {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(default)]
    commentators: Option<Vec<String>>,
    #[serde(rename = "maxChars", default = "default_insight_chars")]
    max_chars: i64,
}

const fn default_insight_chars() -> i64 {
    DEFAULT_INSIGHT_CHARS
}

impl InsightLayersTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }

    /// Case-folded, alphanumeric-only form used to match commentator names
    fn normalize_name(name: &str) -> String {
        name.to_lowercase().chars().filter(char::is_ascii_alphanumeric).collect()
    }

    /// The commentator a link belongs to, from its collective title or
    /// the `"Rashi on Genesis 1:1"` source-ref shape
    fn link_commentator(link: &RelatedLink) -> Option<String> {
        if let Some(ref title) = link.collective_title
            && !title.en.is_empty()
        {
            return Some(title.en.clone());
        }
        let source = link.source_ref.as_deref()?;
        source.split(" on ").next().map(str::to_owned).filter(|s| !s.is_empty())
    }

    /// First sentence of the English text, or its first 200 characters
    fn summarize(english: &str) -> String {
        let trimmed = english.trim();
        if let Some(pos) = trimmed.find(". ") {
            return trimmed[..=pos].to_owned();
        }
        trimmed.chars().take(200).collect()
    }

    /// Up to five theme keywords by frequency
    fn themes(english: &str) -> Vec<String> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for token in english.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
            if token.chars().count() < 3
                || refs::contains_hebrew(token)
                || STOPWORDS.contains(&token)
            {
                continue;
            }
            match counts.iter_mut().find(|(t, _)| t == token) {
                Some((_, n)) => *n += 1,
                None => counts.push((token.to_owned(), 1)),
            }
        }
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts.into_iter().take(5).map(|(t, _)| t).collect()
    }
}

#[async_trait]
impl Tool for InsightLayersTool {
    fn name(&self) -> &'static str {
        "insight_layers"
    }

    fn description(&self) -> &'static str {
        "Layer classic commentators over a ref with summaries and themes"
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "ref": {"type": "string"},
                "commentators": {"type": "array", "items": {"type": "string"}},
                "maxChars": {"type": "integer", "minimum": 1, "maximum": MAX_INSIGHT_CHARS,
                             "default": DEFAULT_INSIGHT_CHARS},
            },
            "required": ["ref"],
        })
    }

    async fn invoke(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let parsed: InsightLayersArgs =
            serde_json::from_value(args.clone()).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
        let reference = refs::normalize_ref(&parsed.reference);
        if reference.is_empty() {
            return Err(ToolError::InvalidInput("ref must not be empty".to_owned()));
        }
        if !(1..=MAX_INSIGHT_CHARS).contains(&parsed.max_chars) {
            return Err(ToolError::InvalidInput(format!(
                "maxChars must be between 1 and {MAX_INSIGHT_CHARS}"
            )));
        }
        let max_chars = parsed.max_chars as usize;

        let key = ToolContext::cache_key(self.name(), &args);
        if let Some(hit) = self.ctx.cache.get(&key) {
            return Ok(hit);
        }

        let related = self.ctx.sefaria.related(&reference).await?;
        let commentary_links: Vec<&RelatedLink> = related
            .links
            .iter()
            .filter(|l| {
                l.link_type.as_deref().is_some_and(|t| t.eq_ignore_ascii_case("commentary"))
                    || l.category.as_deref().is_some_and(|c| c.eq_ignore_ascii_case("commentary"))
            })
            .collect();

        let mut requested: Vec<String> = parsed
            .commentators
            .clone()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_COMMENTATORS.iter().map(|s| (*s).to_owned()).collect());

        // With no explicit panel, add the strongest voices beyond it
        if parsed.commentators.as_ref().is_none_or(Vec::is_empty) {
            let defaults: Vec<String> = requested.iter().map(|n| Self::normalize_name(n)).collect();
            let mut extras: HashMap<String, (String, f64)> = HashMap::new();
            for link in &commentary_links {
                let Some(name) = Self::link_commentator(link) else {
                    continue;
                };
                let folded = Self::normalize_name(&name);
                if folded.is_empty() || defaults.contains(&folded) {
                    continue;
                }
                let entry = extras.entry(folded).or_insert((name, f64::MIN));
                entry.1 = entry.1.max(link.score());
            }
            let mut ranked: Vec<(String, f64)> = extras.into_values().collect();
            ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            requested.extend(ranked.into_iter().take(EXTRA_COMMENTATORS).map(|(name, _)| name));
        }

        let mut layers = Vec::new();
        for name in &requested {
            let folded = Self::normalize_name(name);
            let best = commentary_links
                .iter()
                .filter(|l| {
                    Self::link_commentator(l)
                        .map(|n| Self::normalize_name(&n))
                        .is_some_and(|n| n == folded)
                })
                .max_by(|a, b| a.score().partial_cmp(&b.score()).unwrap_or(std::cmp::Ordering::Equal));

            let Some(link) = best else {
                continue;
            };
            let Some(target) = link.best_ref() else {
                continue;
            };

            let Ok(texts) = self.ctx.sefaria.texts(target, &["english", "hebrew"]).await else {
                tracing::debug!(commentator = %name, link = target, "commentary text unavailable");
                continue;
            };
            let english = texts.flattened("en").unwrap_or_default();
            let hebrew = texts.flattened("he").unwrap_or_default();
            let mut combined = match (english.is_empty(), hebrew.is_empty()) {
                (false, false) => format!("{english}{BILINGUAL_SEPARATOR}{hebrew}"),
                (false, true) => english.clone(),
                (true, false) => hebrew.clone(),
                (true, true) => String::new(),
            };
            if combined.chars().count() > max_chars {
                combined = combined.chars().take(max_chars).collect();
            }

            layers.push(json!({
                "commentator": name,
                "ref": target,
                "url": refs::ref_url(target),
                "text": combined,
                "summary": Self::summarize(&english),
                "themes": Self::themes(&english),
            }));
        }

        let out = json!({
            "ref": reference,
            "url": refs::ref_url(&reference),
            "layers": layers,
            "metadata": {
                "requested": requested,
                "matched": layers.len(),
                "commentaryLinkCount": commentary_links.len(),
            },
        });
        self.ctx.cache.set(&key, out.clone(), self.ctx.default_ttl);
        Ok(out)
    }
}

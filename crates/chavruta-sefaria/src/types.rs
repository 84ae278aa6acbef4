//! Upstream response shapes
//!
//! Everything optional is defaulted: the upstream omits fields freely
//! and a missing field must degrade, not fail.

use serde::Deserialize;

use crate::text;

/// `GET v3/texts/{ref}` response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextsResponse {
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    #[serde(rename = "sectionRef", default)]
    pub section_ref: Option<String>,
    #[serde(rename = "heRef", default)]
    pub he_ref: Option<String>,
    #[serde(default)]
    pub versions: Vec<TextVersion>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextVersion {
    /// `"en"` / `"he"`; upstream sometimes uses `actualLanguage`
    #[serde(default, alias = "actualLanguage")]
    pub language: String,
    #[serde(rename = "versionTitle", default)]
    pub version_title: String,
    /// Arbitrarily nested array of strings
    #[serde(default)]
    pub text: serde_json::Value,
}

impl TextsResponse {
    /// The canonical ref, preferring `ref` over `sectionRef`
    pub fn canonical_ref(&self) -> Option<&str> {
        self.reference.as_deref().or(self.section_ref.as_deref())
    }

    /// Flattened text of the first version matching `language`
    pub fn flattened(&self, language: &str) -> Option<String> {
        self.versions
            .iter()
            .find(|v| v.language == language)
            .map(|v| text::flatten_text(&v.text))
            .filter(|t| !t.is_empty())
    }
}

/// `POST search/text/_search` response (OpenSearch envelope)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub hits: SearchHits,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchHits {
    #[serde(default)]
    pub hits: Vec<SearchHit>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(rename = "_source", default)]
    pub source: serde_json::Value,
    #[serde(default)]
    pub highlight: Option<serde_json::Value>,
}

impl SearchHit {
    /// The hit's ref: `_source.ref`, falling back to the document id
    pub fn reference(&self) -> Option<String> {
        self.source
            .get("ref")
            .and_then(|v| v.as_str())
            .map(str::to_owned)
            .or_else(|| self.id.clone())
    }

    /// First highlight fragment, stripped of markup
    pub fn highlight_text(&self) -> Option<String> {
        let fragments = self.highlight.as_ref()?.as_object()?;
        for value in fragments.values() {
            if let Some(first) = value.as_array().and_then(|a| a.first()).and_then(|v| v.as_str()) {
                return Some(text::strip_html(first));
            }
        }
        None
    }
}

/// `GET related/{ref}` response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelatedResponse {
    #[serde(default)]
    pub links: Vec<RelatedLink>,
    #[serde(default)]
    pub sheets: Vec<RelatedSheet>,
    #[serde(default)]
    pub topics: Vec<RelatedTopic>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelatedLink {
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    #[serde(rename = "sourceRef", default)]
    pub source_ref: Option<String>,
    #[serde(rename = "sourceHeRef", default)]
    pub source_he_ref: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(rename = "type", default)]
    pub link_type: Option<String>,
    #[serde(rename = "collectiveTitle", default)]
    pub collective_title: Option<TitleText>,
    #[serde(default)]
    pub pr: f64,
    #[serde(default)]
    pub tfidf: f64,
    #[serde(default)]
    pub views: f64,
    #[serde(rename = "numDatasource", default)]
    pub num_datasource: f64,
}

impl RelatedLink {
    /// Fixed ranking key used within a category
    pub fn score(&self) -> f64 {
        self.pr * 3.0 + self.tfidf * 2.0 + self.views / 1000.0 + self.num_datasource
    }

    /// Best available ref for this link
    pub fn best_ref(&self) -> Option<&str> {
        self.source_ref.as_deref().or(self.reference.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelatedSheet {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "sheetUrl", default)]
    pub sheet_url: Option<String>,
    #[serde(default)]
    pub views: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelatedTopic {
    #[serde(rename = "topic", default, alias = "slug")]
    pub slug: Option<String>,
    #[serde(default)]
    pub title: Option<TitleText>,
}

/// Bilingual title object (`{en, he}`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TitleText {
    #[serde(default)]
    pub en: String,
    #[serde(default)]
    pub he: Option<String>,
}

/// `GET calendars` response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CalendarResponse {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub calendar_items: Vec<CalendarItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CalendarItem {
    #[serde(default)]
    pub title: TitleText,
    #[serde(rename = "displayValue", default)]
    pub display_value: TitleText,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    #[serde(rename = "heRef", default)]
    pub he_ref: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<TitleText>,
    #[serde(rename = "extraDetails", default)]
    pub extra_details: Option<serde_json::Value>,
}

/// `GET v2/topics/{slug}?with_refs=1` response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopicResponse {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub refs: Vec<TopicRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopicRef {
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub is_sheet: bool,
}

/// `GET sheets/{id}` response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SheetResponse {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub sources: Vec<SheetSource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SheetSource {
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub text: Option<TitleText>,
    #[serde(rename = "outsideText", default)]
    pub outside_text: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// One reference located inside free text by `find-refs`
#[derive(Debug, Clone, PartialEq)]
pub struct RefMatch {
    pub reference: String,
    pub he_ref: Option<String>,
    pub text: Option<String>,
    pub start: Option<i64>,
    pub end: Option<i64>,
}

/// Extract ref matches from a `find-refs` response
///
/// The endpoint's shape varies: results may sit under `body.results`
/// or `results`, each carrying `refs: [..]` or a single
/// `ref`/`bestRef` key. Unknown shapes yield an empty list.
pub fn extract_ref_matches(value: &serde_json::Value) -> Vec<RefMatch> {
    let results = value
        .get("body")
        .and_then(|b| b.get("results"))
        .or_else(|| value.get("results"))
        .and_then(|r| r.as_array());

    let Some(results) = results else {
        return Vec::new();
    };

    let mut matches = Vec::new();
    for item in results {
        let he_ref = item.get("heRef").and_then(|v| v.as_str()).map(str::to_owned);
        let text = item
            .get("text")
            .and_then(|v| v.as_str())
            .map(text::strip_html)
            .filter(|t| !t.is_empty());
        let start = item.get("startChar").or_else(|| item.get("start")).and_then(|v| v.as_i64());
        let end = item.get("endChar").or_else(|| item.get("end")).and_then(|v| v.as_i64());

        let mut refs: Vec<String> = Vec::new();
        if let Some(list) = item.get("refs").and_then(|v| v.as_array()) {
            refs.extend(list.iter().filter_map(|v| v.as_str()).map(str::to_owned));
        }
        for key in ["ref", "bestRef"] {
            if let Some(single) = item.get(key).and_then(|v| v.as_str()) {
                refs.push(single.to_owned());
            }
        }

        for reference in refs {
            matches.push(RefMatch {
                reference,
                he_ref: he_ref.clone(),
                text: text.clone(),
                start,
                end,
            });
        }
    }
    matches
}

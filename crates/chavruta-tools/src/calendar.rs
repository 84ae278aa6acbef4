//! Calendar-driven tools: `get_daily_learnings`, `parsha_pack` and
//! `calendar_insights`

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use chavruta_core::refs;
use chavruta_sefaria::client::CalendarQuery;
use chavruta_sefaria::types::CalendarItem;
use chrono::{Days, NaiveDate, Utc};
use regex::Regex;
use serde::Deserialize;
use serde_json::json;

use crate::context::ToolContext;
use crate::error::ToolError;
use crate::registry::Tool;

/// Daily learning cycles the calendar API schedules
const LEARNING_TRACKS: &[&str] = &[
    "Daf Yomi",
    "Yerushalmi Yomi",
    "Daily Mishnah",
    "Daily Rambam",
    "Daily Rambam (3 Chapters)",
    "Tanakh Yomi",
    "Tanya Yomi",
    "Halakhah Yomit",
    "Arukh HaShulchan Yomi",
    "Chok LeYisrael",
];

const PARSHA_TITLE: &str = "Parashat Hashavua";
const HAFTARAH_PREFIX: &str = "Haftarah";

fn parse_date(raw: &str) -> Result<NaiveDate, ToolError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ToolError::InvalidInput(format!("invalid date (want YYYY-MM-DD): {raw}")))
}

fn calendar_query(date: NaiveDate, diaspora: bool, timezone: Option<&str>, custom: Option<&str>) -> CalendarQuery {
    use chrono::Datelike;
    CalendarQuery {
        year: date.year(),
        month: date.month(),
        day: date.day(),
        diaspora: Some(diaspora),
        timezone: timezone.map(str::to_owned),
        custom: custom.map(str::to_owned),
    }
}

/// Reader URL for a calendar item, from its url path or its ref
fn item_url(item: &CalendarItem) -> Option<String> {
    if let Some(ref path) = item.url {
        return Some(format!("{}/{path}", refs::SEFARIA_ORIGIN));
    }
    item.reference.as_deref().map(refs::ref_url)
}

// ---------------------------------------------------------------- //
// get_daily_learnings
// ---------------------------------------------------------------- //

pub struct GetDailyLearningsTool {
    ctx: Arc<ToolContext>,
}

#[derive(Debug, Deserialize)]
struct DailyLearningsArgs {
    #[serde(default)]
    date: Option<String>,
    #[serde(default = "default_true")]
    diaspora: bool,
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    custom: Option<String>,
}

impl GetDailyLearningsTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for GetDailyLearningsTool {
    fn name(&self) -> &'static str {
        "get_daily_learnings"
    }

    fn description(&self) -> &'static str {
        "The day's scheduled learning cycles (Daf Yomi and friends)"
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "date": {"type": "string", "description": "YYYY-MM-DD, defaults to today (UTC)"},
                "diaspora": {"type": "boolean", "default": true},
                "timezone": {"type": "string"},
                "custom": {"type": "string"},
            },
        })
    }

    async fn invoke(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let parsed: DailyLearningsArgs =
            serde_json::from_value(args.clone()).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
        let date = match parsed.date.as_deref() {
            Some(raw) => parse_date(raw)?,
            None => Utc::now().date_naive(),
        };

        let key = ToolContext::cache_key(self.name(), &args);
        if let Some(hit) = self.ctx.cache.get(&key) {
            return Ok(hit);
        }

        let calendar = self
            .ctx
            .sefaria
            .calendars(&calendar_query(
                date,
                parsed.diaspora,
                parsed.timezone.as_deref(),
                parsed.custom.as_deref(),
            ))
            .await?;

        let learnings: Vec<_> = calendar
            .calendar_items
            .iter()
            .filter(|item| LEARNING_TRACKS.contains(&item.title.en.as_str()))
            .map(|item| {
                json!({
                    "track": item.title.en,
                    "heTrack": item.title.he,
                    "displayValue": item.display_value.en,
                    "ref": item.reference,
                    "url": item_url(item),
                })
            })
            .collect();

        let out = json!({
            "date": date.format("%Y-%m-%d").to_string(),
            "learnings": learnings,
            "metadata": {"diaspora": parsed.diaspora, "itemCount": calendar.calendar_items.len()},
        });
        self.ctx.cache.set(&key, out.clone(), self.ctx.default_ttl);
        Ok(out)
    }
}

// ---------------------------------------------------------------- //
// parsha_pack
// ---------------------------------------------------------------- //

const MAX_LEARNING_TRACKS: i64 = 12;
const DEFAULT_LEARNING_TRACKS: i64 = 6;

pub struct ParshaPackTool {
    ctx: Arc<ToolContext>,
}

#[derive(Debug, Deserialize)]
struct ParshaPackArgs {
    #[serde(default)]
    date: Option<String>,
    #[serde(default = "default_true")]
    diaspora: bool,
    #[serde(default)]
    custom: Option<String>,
    #[serde(default)]
    timezone: Option<String>,
    #[serde(rename = "includeAliyot", default)]
    include_aliyot: bool,
    #[serde(rename = "includeLearningTracks", default = "default_true")]
    include_learning_tracks: bool,
    #[serde(rename = "limitLearningTracks", default = "default_learning_tracks")]
    limit_learning_tracks: i64,
}

const fn default_true() -> bool {
    true
}
const fn default_learning_tracks() -> i64 {
    DEFAULT_LEARNING_TRACKS
}

impl ParshaPackTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for ParshaPackTool {
    fn name(&self) -> &'static str {
        "parsha_pack"
    }

    fn description(&self) -> &'static str {
        "The week's parsha with haftarot, calendar highlights and learning tracks"
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "date": {"type": "string", "description": "YYYY-MM-DD, defaults to today (UTC)"},
                "diaspora": {"type": "boolean", "default": true},
                "custom": {"type": "string"},
                "timezone": {"type": "string"},
                "includeAliyot": {"type": "boolean", "default": false},
                "includeLearningTracks": {"type": "boolean", "default": true},
                "limitLearningTracks": {"type": "integer", "minimum": 1, "maximum": MAX_LEARNING_TRACKS,
                                        "default": DEFAULT_LEARNING_TRACKS},
            },
        })
    }

    async fn invoke(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let parsed: ParshaPackArgs =
            serde_json::from_value(args.clone()).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
        if !(1..=MAX_LEARNING_TRACKS).contains(&parsed.limit_learning_tracks) {
            return Err(ToolError::InvalidInput(format!(
                "limitLearningTracks must be between 1 and {MAX_LEARNING_TRACKS}"
            )));
        }

        let date = match parsed.date.as_deref() {
            Some(raw) => parse_date(raw)?,
            None => Utc::now().date_naive(),
        };

        let key = ToolContext::cache_key(self.name(), &args);
        if let Some(hit) = self.ctx.cache.get(&key) {
            return Ok(hit);
        }

        let calendar = self
            .ctx
            .sefaria
            .calendars(&calendar_query(
                date,
                parsed.diaspora,
                parsed.timezone.as_deref(),
                parsed.custom.as_deref(),
            ))
            .await?;

        let parsha_item = calendar
            .calendar_items
            .iter()
            .find(|item| item.title.en == PARSHA_TITLE)
            .ok_or_else(|| ToolError::NotFound(format!("no {PARSHA_TITLE} item for {date}")))?;

        let mut parsha = serde_json::Map::new();
        parsha.insert("name".to_owned(), json!(parsha_item.display_value.en));
        if let Some(ref he) = parsha_item.display_value.he {
            parsha.insert("heName".to_owned(), json!(he));
        }
        if let Some(ref reference) = parsha_item.reference {
            parsha.insert("ref".to_owned(), json!(reference));
        }
        if let Some(ref he_ref) = parsha_item.he_ref {
            parsha.insert("heRef".to_owned(), json!(he_ref));
        }
        if let Some(url) = item_url(parsha_item) {
            parsha.insert("url".to_owned(), json!(url));
        }
        if let Some(ref description) = parsha_item.description {
            parsha.insert("description".to_owned(), json!(description.en));
        }
        if parsed.include_aliyot
            && let Some(aliyot) = parsha_item.extra_details.as_ref().and_then(|d| d.get("aliyot"))
        {
            parsha.insert("aliyot".to_owned(), aliyot.clone());
        }

        let haftarot: Vec<_> = calendar
            .calendar_items
            .iter()
            .filter(|item| item.title.en.starts_with(HAFTARAH_PREFIX))
            .map(|item| {
                json!({
                    "title": item.title.en,
                    "displayValue": item.display_value.en,
                    "ref": item.reference,
                    "url": item_url(item),
                })
            })
            .collect();

        // Anything else with a display value that is neither parsha,
        // haftarah, nor a learning track
        let highlights: Vec<_> = calendar
            .calendar_items
            .iter()
            .filter(|item| {
                !item.display_value.en.is_empty()
                    && item.title.en != PARSHA_TITLE
                    && !item.title.en.starts_with(HAFTARAH_PREFIX)
                    && !LEARNING_TRACKS.contains(&item.title.en.as_str())
            })
            .map(|item| {
                json!({
                    "title": item.title.en,
                    "displayValue": item.display_value.en,
                    "ref": item.reference,
                    "url": item_url(item),
                })
            })
            .collect();

        let learning_tracks: Option<Vec<_>> = parsed.include_learning_tracks.then(|| {
            calendar
                .calendar_items
                .iter()
                .filter(|item| LEARNING_TRACKS.contains(&item.title.en.as_str()))
                .take(parsed.limit_learning_tracks as usize)
                .map(|item| {
                    json!({
                        "track": item.title.en,
                        "displayValue": item.display_value.en,
                        "ref": item.reference,
                        "url": item_url(item),
                    })
                })
                .collect()
        });

        let out = json!({
            "date": date.format("%Y-%m-%d").to_string(),
            "parsha": parsha,
            "haftarot": haftarot,
            "highlights": highlights,
            "learningTracks": learning_tracks,
            "metadata": {"itemCount": calendar.calendar_items.len(), "diaspora": parsed.diaspora},
        });
        self.ctx.cache.set(&key, out.clone(), self.ctx.default_ttl);
        Ok(out)
    }
}

// ---------------------------------------------------------------- //
// calendar_insights
// ---------------------------------------------------------------- //

const INSIGHTS_TTL: Duration = Duration::from_millis(3_600_000);
const INSIGHT_DAYS: u64 = 7;

pub struct CalendarInsightsTool {
    ctx: Arc<ToolContext>,
}

#[derive(Debug, Deserialize)]
struct CalendarInsightsArgs {
    #[serde(rename = "startDate", default)]
    start_date: Option<String>,
    #[serde(default = "default_true")]
    diaspora: bool,
    #[serde(rename = "includeLearningTracks", default = "default_true")]
    include_learning_tracks: bool,
    #[serde(default)]
    interests: Option<Vec<String>>,
    #[serde(default)]
    timezone: Option<String>,
}

/// Classification tags, first matching pattern wins
fn classifiers() -> &'static [(&'static str, Regex)] {
    static CLASSIFIERS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    CLASSIFIERS.get_or_init(|| {
        [
            ("parsha", r"(?i)parashat"),
            ("haftarah", r"(?i)haftarah"),
            ("rosh_chodesh", r"(?i)rosh chodesh"),
            ("fast", r"(?i)\bfast\b|ta'anit|tzom|tisha b'av"),
            ("shabbat", r"(?i)shabbat"),
            (
                "chag",
                r"(?i)yom tov|chag|pesach|passover|sukkot|shavuot|rosh hashanah|yom kippur|purim|chanukah|hanukkah|shemini atzeret|simchat torah",
            ),
            ("daf", r"(?i)\bdaf\b"),
        ]
        .into_iter()
        .map(|(tag, pattern)| (tag, Regex::new(pattern).expect("classifier patterns are static")))
        .collect()
    })
}

/// Observance preparations keyed by classification
fn halacha_checklist(classification: &str) -> Option<Vec<&'static str>> {
    match classification {
        "shabbat" => Some(vec!["Candle lighting", "Eruv check", "Food prep", "Havdalah"]),
        "fast" => Some(vec!["Start/End times", "Health exemptions", "Hydration plan"]),
        "chag" => Some(vec!["Kiddush/Challah", "Eruv Tavshilin (if chag\u{2192}Shabbat)", "Hallel"]),
        "rosh_chodesh" => Some(vec!["Ya'aleh V'Yavo", "Hallel (partial/full)"]),
        _ => None,
    }
}

impl CalendarInsightsTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }

    fn classify(item: &CalendarItem) -> &'static str {
        let haystack = format!("{} {}", item.title.en, item.category.as_deref().unwrap_or_default());
        for (tag, pattern) in classifiers() {
            if pattern.is_match(&haystack) {
                return tag;
            }
        }
        "other"
    }

    fn item_entry(item: &CalendarItem, classification: &str) -> serde_json::Value {
        let mut entry = serde_json::Map::new();
        entry.insert("title".to_owned(), json!(item.title.en));
        entry.insert("displayValue".to_owned(), json!(item.display_value.en));
        entry.insert("type".to_owned(), json!(classification));
        if let Some(ref reference) = item.reference {
            entry.insert("ref".to_owned(), json!(reference));
        }
        if let Some(url) = item_url(item) {
            entry.insert("url".to_owned(), json!(url));
        }
        if matches!(classification, "parsha" | "daf")
            && let Some(ref reference) = item.reference
        {
            entry.insert(
                "recommendedSources".to_owned(),
                json!([{"ref": reference, "url": refs::ref_url(reference)}]),
            );
        }
        if let Some(checklist) = halacha_checklist(classification) {
            entry.insert("halachaChecklist".to_owned(), json!(checklist));
        }
        serde_json::Value::Object(entry)
    }
}

#[async_trait]
impl Tool for CalendarInsightsTool {
    fn name(&self) -> &'static str {
        "calendar_insights"
    }

    fn description(&self) -> &'static str {
        "A week of calendar alerts, classified and filtered by interest"
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "startDate": {"type": "string", "description": "YYYY-MM-DD, defaults to today (UTC)"},
                "diaspora": {"type": "boolean", "default": true},
                "includeLearningTracks": {"type": "boolean", "default": true},
                "interests": {"type": "array", "items": {"type": "string"}},
                "timezone": {"type": "string"},
            },
        })
    }

    async fn invoke(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let parsed: CalendarInsightsArgs =
            serde_json::from_value(args.clone()).map_err(|e| ToolError::InvalidInput(e.to_string()))?;

        let start = match parsed.start_date.as_deref() {
            Some(raw) => parse_date(raw)?,
            None => Utc::now().date_naive(),
        };
        let interests: Vec<String> = parsed
            .interests
            .unwrap_or_default()
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();

        let key = ToolContext::cache_key(self.name(), &args);
        if let Some(hit) = self.ctx.cache.get(&key) {
            return Ok(hit);
        }

        let dates: Vec<NaiveDate> = (0..INSIGHT_DAYS)
            .filter_map(|offset| start.checked_add_days(Days::new(offset)))
            .collect();

        let queries: Vec<CalendarQuery> = dates
            .iter()
            .map(|date| calendar_query(*date, parsed.diaspora, parsed.timezone.as_deref(), None))
            .collect();
        let responses =
            futures_util::future::join_all(queries.iter().map(|q| self.ctx.sefaria.calendars(q))).await;

        let mut days = Vec::with_capacity(dates.len());
        for (date, response) in dates.iter().zip(responses) {
            let mut day = serde_json::Map::new();
            day.insert("date".to_owned(), json!(date.format("%Y-%m-%d").to_string()));

            match response {
                Ok(calendar) => {
                    let items: Vec<_> = calendar
                        .calendar_items
                        .iter()
                        .filter(|item| {
                            parsed.include_learning_tracks
                                || !LEARNING_TRACKS.contains(&item.title.en.as_str())
                        })
                        .filter_map(|item| {
                            let classification = Self::classify(item);
                            if !interests.is_empty()
                                && !interests.iter().any(|tag| classification.contains(tag.as_str()))
                            {
                                return None;
                            }
                            Some(Self::item_entry(item, classification))
                        })
                        .collect();
                    day.insert("items".to_owned(), json!(items));
                }
                Err(e) => {
                    tracing::warn!(date = %date, error = %e, "calendar day unavailable");
                    day.insert("items".to_owned(), json!([]));
                    day.insert("error".to_owned(), json!(e.to_string()));
                }
            }
            days.push(serde_json::Value::Object(day));
        }

        let out = json!({
            "startDate": start.format("%Y-%m-%d").to_string(),
            "days": days,
            "metadata": {
                "diaspora": parsed.diaspora,
                "interests": interests,
            },
        });
        self.ctx.cache.set(&key, out.clone(), INSIGHTS_TTL);
        Ok(out)
    }
}

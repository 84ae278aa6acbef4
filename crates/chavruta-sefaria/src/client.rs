//! HTTP client for the Sefaria API
//!
//! One `reqwest::Client` (keep-alive pooled) shared by all tools.
//! Every call runs under a per-attempt timeout with up to two retries
//! on exponential backoff.

use std::time::Duration;

use serde::de::DeserializeOwned;
use url::Url;

use crate::error::SefariaError;
use crate::types::{
    CalendarResponse, RelatedResponse, SearchResponse, SheetResponse, TextsResponse, TopicResponse,
};

/// Retries after the initial attempt
const MAX_RETRIES: u32 = 2;
/// Backoff base; the nth retry sleeps `400ms << n`
const BACKOFF_BASE_MS: u64 = 400;
/// Per-attempt budget covering send + body read
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(7);
/// Upstream body preview length kept for logs and errors
const PREVIEW_CHARS: usize = 200;

/// Typed wrapper over the corpus endpoints
#[derive(Clone)]
pub struct SefariaClient {
    http: reqwest::Client,
    base_url: Url,
}

/// Parameters for `GET calendars`
#[derive(Debug, Clone, Default)]
pub struct CalendarQuery {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub diaspora: Option<bool>,
    pub timezone: Option<String>,
    pub custom: Option<String>,
}

impl SefariaClient {
    /// Create a client against the given API base (e.g.
    /// `https://www.sefaria.org/api`)
    pub fn new(base_url: &str) -> Result<Self, SefariaError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| SefariaError::Request(format!("invalid base URL: {e}")))?;
        let http = reqwest::Client::builder()
            .user_agent("chavruta/0.4")
            .build()
            .map_err(|e| SefariaError::Request(e.to_string()))?;
        Ok(Self { http, base_url })
    }

    /// `GET v3/texts/{ref}` with the requested versions
    pub async fn texts(&self, reference: &str, versions: &[&str]) -> Result<TextsResponse, SefariaError> {
        let url = self.endpoint(&["v3", "texts", reference])?;
        let mut query: Vec<(&str, &str)> = versions.iter().map(|v| ("version", *v)).collect();
        query.push(("return_format", "text_only"));
        self.execute("v3/texts", self.http.get(url).query(&query)).await
    }

    /// `POST search/text/_search` with an OpenSearch-style body
    pub async fn search(&self, body: &serde_json::Value) -> Result<SearchResponse, SefariaError> {
        let url = self.endpoint(&["search", "text", "_search"])?;
        self.execute("search", self.http.post(url).json(body)).await
    }

    /// `GET related/{ref}`
    pub async fn related(&self, reference: &str) -> Result<RelatedResponse, SefariaError> {
        let url = self.endpoint(&["related", reference])?;
        self.execute("related", self.http.get(url)).await
    }

    /// `GET calendars` for one day
    pub async fn calendars(&self, query: &CalendarQuery) -> Result<CalendarResponse, SefariaError> {
        let url = self.endpoint(&["calendars"])?;
        let mut params = vec![
            ("year", query.year.to_string()),
            ("month", query.month.to_string()),
            ("day", query.day.to_string()),
        ];
        if let Some(diaspora) = query.diaspora {
            params.push(("diaspora", if diaspora { "1" } else { "0" }.to_owned()));
        }
        if let Some(ref tz) = query.timezone {
            params.push(("timezone", tz.clone()));
        }
        if let Some(ref custom) = query.custom {
            params.push(("custom", custom.clone()));
        }
        self.execute("calendars", self.http.get(url).query(&params)).await
    }

    /// `POST find-refs`: locate citations inside free text
    ///
    /// The response shape varies between deployments, so the raw JSON
    /// is returned for defensive extraction.
    pub async fn find_refs(&self, text: &str, lang: Option<&str>) -> Result<serde_json::Value, SefariaError> {
        let url = self.endpoint(&["find-refs"])?;
        let body = serde_json::json!({
            "text": {"title": "", "body": text},
            "lang": lang.unwrap_or("en"),
        });
        self.execute("find-refs", self.http.post(url).json(&body)).await
    }

    /// `GET v2/topics/{slug}?with_refs=1`
    pub async fn topic(&self, slug: &str) -> Result<TopicResponse, SefariaError> {
        let url = self.endpoint(&["v2", "topics", slug])?;
        self.execute("v2/topics", self.http.get(url).query(&[("with_refs", "1")]))
            .await
    }

    /// `GET sheets/{id}`
    pub async fn sheet(&self, id: &str) -> Result<SheetResponse, SefariaError> {
        let url = self.endpoint(&["sheets", id])?;
        self.execute("sheets", self.http.get(url)).await
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, SefariaError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| SefariaError::Request("base URL cannot be a base".to_owned()))?
            .extend(segments);
        Ok(url)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, SefariaError> {
        let mut last_error = SefariaError::Request("no attempt made".to_owned());

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let backoff = BACKOFF_BASE_MS << (attempt - 1);
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            let Some(request) = builder.try_clone() else {
                return Err(SefariaError::Request("request body not cloneable".to_owned()));
            };

            match tokio::time::timeout(ATTEMPT_TIMEOUT, Self::attempt(request)).await {
                Err(_) => {
                    last_error = SefariaError::Timeout {
                        ms: ATTEMPT_TIMEOUT.as_millis() as u64,
                    };
                    tracing::warn!(endpoint, attempt, "sefaria attempt timed out");
                }
                Ok(Err(e)) => {
                    tracing::warn!(endpoint, attempt, error = %e, "sefaria attempt failed");
                    // A body that parsed as non-JSON will not improve on retry
                    if matches!(e, SefariaError::Decode(_)) {
                        return Err(e);
                    }
                    last_error = e;
                }
                Ok(Ok(value)) => {
                    return serde_json::from_value(value).map_err(|e| SefariaError::Decode(e.to_string()));
                }
            }
        }

        Err(last_error)
    }

    async fn attempt(request: reqwest::RequestBuilder) -> Result<serde_json::Value, SefariaError> {
        let response = request.send().await.map_err(|e| SefariaError::Request(e.to_string()))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| SefariaError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(SefariaError::Upstream {
                status: status.as_u16(),
                preview: body.chars().take(PREVIEW_CHARS).collect(),
            });
        }

        serde_json::from_str(&body).map_err(|e| SefariaError::Decode(e.to_string()))
    }
}

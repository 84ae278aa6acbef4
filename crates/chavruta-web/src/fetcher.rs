//! The safe web fetcher
//!
//! Pipeline per request: host policy → concurrency gates → (per hop)
//! SSRF resolution + robots → manual redirects → capped body read →
//! content dispatch → normalization. Successful fetches land in a
//! read-refresh LRU cache carrying the upstream validators, so repeat
//! fetches either return the cached document or revalidate with 304.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chavruta_cache::TtlLruCache;
use chavruta_config::{CacheConfig, WebConfig};
use chavruta_core::Document;
use chavruta_telemetry::Metrics;
use futures_util::StreamExt;
use reqwest::header;
use serde_json::json;
use url::Url;

use crate::error::WebError;
use crate::extract::{self, Extracted};
use crate::gates::FetchGates;
use crate::robots::RobotsCache;
use crate::ssrf::{self, HostPolicy};

/// Redirect hop budget
const MAX_REDIRECTS: usize = 5;

/// One cached fetch with its revalidation handles
#[derive(Clone)]
struct CacheEntry {
    status: u16,
    etag: Option<String>,
    last_modified: Option<String>,
    bytes: usize,
    document: Document,
}

/// Everything learned from one (redirect-following) retrieval
struct Retrieved {
    final_url: Url,
    status: u16,
    content_type: Option<String>,
    etag: Option<String>,
    last_modified: Option<String>,
    body: Vec<u8>,
    not_modified: bool,
}

pub struct WebFetcher {
    http: reqwest::Client,
    policy: HostPolicy,
    robots: Option<RobotsCache>,
    gates: FetchGates,
    cache: TtlLruCache<CacheEntry>,
    metrics: Arc<Metrics>,
    max_bytes: usize,
    max_chars: usize,
    timeout: Duration,
    cache_ttl: Duration,
    allow_private: bool,
}

impl WebFetcher {
    pub fn new(
        config: &WebConfig,
        cache_config: &CacheConfig,
        metrics: Arc<Metrics>,
    ) -> Result<Self, WebError> {
        let http = reqwest::Client::builder()
            .user_agent(config.robots_user_agent.clone())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| WebError::Request(e.to_string()))?;

        let robots = if config.robots_obey {
            Some(RobotsCache::new(&config.robots_user_agent)?)
        } else {
            None
        };

        Ok(Self {
            http,
            policy: HostPolicy::new(config.allowlist.clone(), config.blocklist.clone()),
            robots,
            gates: FetchGates::new(config.max_concurrency, config.per_host_concurrency),
            cache: TtlLruCache::with_read_refresh(cache_config.web_cache_max_entries),
            metrics,
            max_bytes: config.max_bytes,
            max_chars: config.max_chars,
            timeout: Duration::from_millis(config.timeout_ms),
            cache_ttl: Duration::from_millis(cache_config.ttl_ms),
            allow_private: config.allow_private,
        })
    }

    pub const fn policy(&self) -> &HostPolicy {
        &self.policy
    }

    /// Fetch a URL and extract a readable document
    pub async fn fetch(&self, id: &str, max_chars: Option<usize>) -> Result<Document, WebError> {
        let url = Url::parse(id).map_err(|e| WebError::InvalidUrl(e.to_string()))?;
        ssrf::validate_url(&url, &self.policy)?;
        let host = url.host_str().unwrap_or_default().to_owned();

        let _permit = self.gates.acquire(&host).await?;
        self.metrics.record_fetch();

        let result = self.fetch_document(url, id, max_chars).await;
        if result.is_err() {
            self.metrics.record_fetch_error();
        }
        result
    }

    /// Fetch raw bytes (image proxy): same policy pipeline, no extraction
    pub async fn fetch_raw(&self, id: &str) -> Result<(Vec<u8>, String), WebError> {
        let url = Url::parse(id).map_err(|e| WebError::InvalidUrl(e.to_string()))?;
        ssrf::validate_url(&url, &self.policy)?;
        let host = url.host_str().unwrap_or_default().to_owned();

        let _permit = self.gates.acquire(&host).await?;
        self.metrics.record_fetch();

        let retrieved = match self.retrieve(url, None).await {
            Ok(r) => r,
            Err(e) => {
                self.metrics.record_fetch_error();
                return Err(e);
            }
        };
        let content_type = retrieved.content_type.unwrap_or_else(|| "application/octet-stream".to_owned());
        Ok((retrieved.body, content_type))
    }

    async fn fetch_document(
        &self,
        url: Url,
        id: &str,
        max_chars: Option<usize>,
    ) -> Result<Document, WebError> {
        let cached = self.cache.get(id);

        // Entries without validators cannot be revalidated; within TTL
        // they are served as-is.
        if let Some(ref entry) = cached
            && entry.etag.is_none()
            && entry.last_modified.is_none()
        {
            tracing::debug!(id, status = entry.status, bytes = entry.bytes, "serving cached fetch");
            self.metrics.record_cache_hit();
            return Ok(entry.document.clone());
        }

        let conditional = cached
            .as_ref()
            .map(|e| (e.etag.clone(), e.last_modified.clone()));
        let retrieved = self.retrieve(url, conditional).await?;

        if retrieved.not_modified {
            if let Some(entry) = cached {
                tracing::debug!(id, status = entry.status, bytes = entry.bytes, "revalidated, serving cached fetch");
                self.metrics.record_cache_hit();
                return Ok(entry.document.clone());
            }
            // A 304 without a cached entry is an upstream contract break
            return Err(WebError::Status { status: 304 });
        }

        let received = retrieved.body.len();
        let content_type = retrieved
            .content_type
            .as_deref()
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase());

        let extracted = self.dispatch(&retrieved, content_type.as_deref())?;

        let cap = max_chars.unwrap_or(self.max_chars).min(extract::HARD_MAX_CHARS);
        let (text, truncated) = extract::normalize(&extracted.text, cap);

        let mut metadata = serde_json::Map::new();
        metadata.insert(
            "contentType".to_owned(),
            json!(content_type.as_deref().unwrap_or("unknown")),
        );
        metadata.insert("fetchedAt".to_owned(), json!(chrono::Utc::now().to_rfc3339()));
        metadata.insert("bytes".to_owned(), json!(received));
        if let Some(ref canonical) = extracted.canonical_url {
            metadata.insert("canonicalUrl".to_owned(), json!(canonical));
        }
        if let Some(ref language) = extracted.language {
            metadata.insert("language".to_owned(), json!(language));
        }
        if let Some(pages) = extracted.page_count {
            metadata.insert("pageCount".to_owned(), json!(pages));
        }
        if truncated {
            metadata.insert("truncated".to_owned(), json!(true));
        }

        let document = Document {
            id: id.to_owned(),
            title: extracted.title,
            text,
            url: retrieved.final_url.to_string(),
            metadata,
        };

        self.cache.set(
            id,
            CacheEntry {
                status: retrieved.status,
                etag: retrieved.etag,
                last_modified: retrieved.last_modified,
                bytes: received,
                document: document.clone(),
            },
            self.cache_ttl,
        );

        Ok(document)
    }

    fn dispatch(&self, retrieved: &Retrieved, content_type: Option<&str>) -> Result<Extracted, WebError> {
        let is_pdf = content_type.is_some_and(|ct| ct.starts_with("application/pdf"))
            || extract::path_looks_like_pdf(&retrieved.final_url);

        if is_pdf {
            return extract::extract_pdf(&retrieved.body);
        }

        let text = String::from_utf8_lossy(&retrieved.body);
        match content_type {
            Some(ct) if ct.starts_with("text/html") => Ok(extract::extract_html(&text)),
            Some(ct) if ct.starts_with("text/plain") => Ok(Extracted {
                title: "Untitled".to_owned(),
                text: text.into_owned(),
                ..Extracted::default()
            }),
            None => Ok(Extracted {
                title: "Untitled".to_owned(),
                text: text.into_owned(),
                ..Extracted::default()
            }),
            // Unknown types get DOM-parsed and stripped
            Some(_) => Ok(extract::extract_html(&text)),
        }
    }

    /// Follow redirects manually, re-checking policy on every hop
    async fn retrieve(
        &self,
        initial: Url,
        conditional: Option<(Option<String>, Option<String>)>,
    ) -> Result<Retrieved, WebError> {
        let mut url = initial.clone();
        let mut visited: HashSet<String> = HashSet::new();

        for _hop in 0..=MAX_REDIRECTS {
            visited.insert(url.to_string());

            ssrf::validate_url(&url, &self.policy)?;
            if !self.allow_private {
                ssrf::resolve_public(&url).await?;
            }

            if let Some(ref robots) = self.robots
                && !robots.allows(&url).await?
            {
                self.metrics.record_robots_blocked();
                return Err(WebError::Blocked(format!("robots.txt disallows {url}")));
            }

            let mut request = self.http.get(url.clone());
            if url == initial
                && let Some((ref etag, ref last_modified)) = conditional
            {
                if let Some(etag) = etag {
                    request = request.header(header::IF_NONE_MATCH, etag);
                }
                if let Some(last_modified) = last_modified {
                    request = request.header(header::IF_MODIFIED_SINCE, last_modified);
                }
            }

            let response = tokio::time::timeout(self.timeout, request.send())
                .await
                .map_err(|_| WebError::Timeout {
                    ms: self.timeout.as_millis() as u64,
                })?
                .map_err(|e| WebError::Request(e.to_string()))?;

            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| WebError::Request("redirect without Location".to_owned()))?;
                let next = url
                    .join(location)
                    .map_err(|e| WebError::InvalidUrl(format!("bad redirect target: {e}")))?;

                if url.scheme() == "https" && next.scheme() == "http" {
                    return Err(WebError::Blocked("https to http downgrade refused".to_owned()));
                }
                if visited.contains(next.as_str()) {
                    return Err(WebError::Request("redirect cycle detected".to_owned()));
                }
                tracing::debug!(from = %url, to = %next, "following redirect");
                url = next;
                continue;
            }

            if status == reqwest::StatusCode::NOT_MODIFIED {
                return Ok(Retrieved {
                    final_url: url,
                    status: status.as_u16(),
                    content_type: None,
                    etag: None,
                    last_modified: None,
                    body: Vec::new(),
                    not_modified: true,
                });
            }

            if !status.is_success() {
                return Err(WebError::Status {
                    status: status.as_u16(),
                });
            }

            let header_str = |name: header::HeaderName| {
                response
                    .headers()
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned)
            };
            let content_type = header_str(header::CONTENT_TYPE);
            let etag = header_str(header::ETAG);
            let last_modified = header_str(header::LAST_MODIFIED);

            let body = tokio::time::timeout(self.timeout, read_capped(response, self.max_bytes))
                .await
                .map_err(|_| WebError::Timeout {
                    ms: self.timeout.as_millis() as u64,
                })??;

            return Ok(Retrieved {
                final_url: url,
                status: status.as_u16(),
                content_type,
                etag,
                last_modified,
                body,
                not_modified: false,
            });
        }

        Err(WebError::Blocked(format!("too many redirects (>{MAX_REDIRECTS})")))
    }
}

/// Stream the body, capping at `max_bytes` before any parsing
async fn read_capped(response: reqwest::Response, max_bytes: usize) -> Result<Vec<u8>, WebError> {
    let mut body: Vec<u8> = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| WebError::Request(e.to_string()))?;
        let remaining = max_bytes.saturating_sub(body.len());
        if remaining == 0 {
            tracing::debug!(max_bytes, "body cap reached, truncating");
            break;
        }
        body.extend_from_slice(&chunk[..chunk.len().min(remaining)]);
    }
    Ok(body)
}

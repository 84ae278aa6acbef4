//! Web search multiplexer: fixed-order provider fan-out
//!
//! Providers are tried in declared order — Tavily, SerpAPI, Brave —
//! and a provider is active only when its key is configured. Results
//! pass the host policy and are de-duplicated by origin + path; the
//! fan-out stops as soon as the cap is reached. A provider error
//! skips to the next provider rather than failing the search.

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::WebError;
use crate::ssrf::HostPolicy;

const PROVIDER_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// One search result from any provider
#[derive(Debug, Clone)]
pub struct ProviderHit {
    pub title: String,
    pub url: String,
}

enum Provider {
    Tavily(SecretString),
    SerpApi(SecretString),
    Brave(SecretString),
}

impl Provider {
    const fn name(&self) -> &'static str {
        match self {
            Self::Tavily(_) => "tavily",
            Self::SerpApi(_) => "serpapi",
            Self::Brave(_) => "brave",
        }
    }
}

/// Ordered set of active providers
pub struct SearchProviders {
    http: reqwest::Client,
    providers: Vec<Provider>,
}

impl SearchProviders {
    /// Build from optional provider keys (order fixed)
    pub fn new(
        tavily: Option<SecretString>,
        serpapi: Option<SecretString>,
        brave: Option<SecretString>,
    ) -> Result<Self, WebError> {
        let http = reqwest::Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .build()
            .map_err(|e| WebError::Request(e.to_string()))?;

        let mut providers = Vec::new();
        if let Some(key) = tavily {
            providers.push(Provider::Tavily(key));
        }
        if let Some(key) = serpapi {
            providers.push(Provider::SerpApi(key));
        }
        if let Some(key) = brave {
            providers.push(Provider::Brave(key));
        }

        Ok(Self { http, providers })
    }

    pub fn active_count(&self) -> usize {
        self.providers.len()
    }

    /// Fan out in order, filter, de-duplicate, cap
    ///
    /// All-provider failure yields an empty list, not an error.
    pub async fn search(&self, query: &str, max_results: usize, policy: &HostPolicy) -> Vec<ProviderHit> {
        let mut seen = std::collections::HashSet::new();
        let mut out: Vec<ProviderHit> = Vec::new();

        for provider in &self.providers {
            if out.len() >= max_results {
                break;
            }
            let hits = match self.query_provider(provider, query, max_results).await {
                Ok(hits) => hits,
                Err(e) => {
                    tracing::warn!(provider = provider.name(), error = %e, "search provider failed");
                    continue;
                }
            };

            for hit in hits {
                if out.len() >= max_results {
                    break;
                }
                let Ok(parsed) = Url::parse(&hit.url) else {
                    continue;
                };
                let Some(host) = parsed.host_str() else {
                    continue;
                };
                if policy.check(&host.to_lowercase()).is_err() {
                    continue;
                }
                let dedup_key = format!("{}{}", parsed.origin().ascii_serialization(), parsed.path());
                if seen.insert(dedup_key) {
                    out.push(hit);
                }
            }
        }

        out
    }

    async fn query_provider(
        &self,
        provider: &Provider,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<ProviderHit>, WebError> {
        let value = match provider {
            Provider::Tavily(key) => {
                let body = serde_json::json!({
                    "api_key": key.expose_secret(),
                    "query": query,
                    "max_results": max_results,
                });
                self.post_json("https://api.tavily.com/search", &body).await?
            }
            Provider::SerpApi(key) => {
                self.get_json(
                    "https://serpapi.com/search.json",
                    &[("q", query), ("api_key", key.expose_secret())],
                    &[],
                )
                .await?
            }
            Provider::Brave(key) => {
                self.get_json(
                    "https://api.search.brave.com/res/v1/web/search",
                    &[("q", query), ("count", &max_results.to_string())],
                    &[("X-Subscription-Token", key.expose_secret())],
                )
                .await?
            }
        };

        Ok(parse_hits(provider, &value))
    }

    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<serde_json::Value, WebError> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| WebError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(WebError::Status {
                status: response.status().as_u16(),
            });
        }
        response.json().await.map_err(|e| WebError::Request(e.to_string()))
    }

    async fn get_json(
        &self,
        url: &str,
        query: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<serde_json::Value, WebError> {
        let mut request = self.http.get(url).query(query);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request.send().await.map_err(|e| WebError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(WebError::Status {
                status: response.status().as_u16(),
            });
        }
        response.json().await.map_err(|e| WebError::Request(e.to_string()))
    }
}

/// Pull `{title, url}` pairs out of a provider response envelope
fn parse_hits(provider: &Provider, value: &serde_json::Value) -> Vec<ProviderHit> {
    let (items, url_key) = match provider {
        Provider::Tavily(_) => (value.get("results"), "url"),
        Provider::SerpApi(_) => (value.get("organic_results"), "link"),
        Provider::Brave(_) => (value.get("web").and_then(|w| w.get("results")), "url"),
    };

    items
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let url = item.get(url_key)?.as_str()?.to_owned();
                    let title = item
                        .get("title")
                        .and_then(|t| t.as_str())
                        .unwrap_or(&url)
                        .to_owned();
                    Some(ProviderHit { title, url })
                })
                .collect()
        })
        .unwrap_or_default()
}

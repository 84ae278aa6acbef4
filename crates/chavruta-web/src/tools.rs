//! The web research tool pair exposed by the web MCP server

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chavruta_cache::ResponseCache;
use chavruta_tools::{Tool, ToolContext, ToolError, ToolRegistry};
use serde::Deserialize;
use serde_json::json;

use crate::fetcher::WebFetcher;
use crate::providers::SearchProviders;

const MAX_RESULTS: i64 = 25;

/// Build the web-side tool registry
pub fn web_registry(
    providers: Arc<SearchProviders>,
    fetcher: Arc<WebFetcher>,
    cache: Arc<ResponseCache>,
    default_ttl: Duration,
    default_max_results: usize,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(WebSearchTool {
        providers,
        fetcher: Arc::clone(&fetcher),
        cache,
        default_ttl,
        default_max_results,
    }));
    registry.register(Arc::new(WebFetchTool { fetcher }));
    registry
}

// ---------------------------------------------------------------- //
// search
// ---------------------------------------------------------------- //

struct WebSearchTool {
    providers: Arc<SearchProviders>,
    fetcher: Arc<WebFetcher>,
    cache: Arc<ResponseCache>,
    default_ttl: Duration,
    default_max_results: usize,
}

#[derive(Debug, Deserialize)]
struct WebSearchArgs {
    query: String,
    #[serde(rename = "maxResults", default)]
    max_results: Option<i64>,
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &'static str {
        "search"
    }

    fn description(&self) -> &'static str {
        "Search the web across the configured providers"
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "maxResults": {"type": "integer", "minimum": 1, "maximum": MAX_RESULTS},
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
        let parsed: WebSearchArgs =
            serde_json::from_value(args.clone()).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
        if parsed.query.trim().is_empty() {
            return Err(ToolError::InvalidInput("query must not be empty".to_owned()));
        }
        let max_results = match parsed.max_results {
            Some(n) if !(1..=MAX_RESULTS).contains(&n) => {
                return Err(ToolError::InvalidInput(format!(
                    "maxResults must be between 1 and {MAX_RESULTS}"
                )));
            }
            Some(n) => n as usize,
            None => self.default_max_results,
        };

        let key = ToolContext::cache_key("web.search", &args);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let hits = self
            .providers
            .search(parsed.query.trim(), max_results, self.fetcher.policy())
            .await;

        let results: Vec<_> = hits
            .iter()
            .map(|hit| json!({"id": hit.url, "title": hit.title, "url": hit.url}))
            .collect();

        let out = json!({"results": results});
        self.cache.set(&key, out.clone(), self.default_ttl);
        Ok(out)
    }
}

// ---------------------------------------------------------------- //
// fetch
// ---------------------------------------------------------------- //

struct WebFetchTool {
    fetcher: Arc<WebFetcher>,
}

#[derive(Debug, Deserialize)]
struct WebFetchArgs {
    id: String,
    #[serde(rename = "maxChars", default)]
    max_chars: Option<i64>,
}

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &'static str {
        "fetch"
    }

    fn description(&self) -> &'static str {
        "Fetch a URL and extract its readable content"
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "id": {"type": "string", "description": "Absolute http(s) URL"},
                "maxChars": {"type": "integer", "minimum": 1},
            },
            "required": ["id"],
        })
    }

    async fn invoke(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let parsed: WebFetchArgs =
            serde_json::from_value(args).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
        let max_chars = match parsed.max_chars {
            Some(n) if n <= 0 => {
                return Err(ToolError::InvalidInput("maxChars must be positive".to_owned()));
            }
            other => other.map(|n| n as usize),
        };

        let document = self.fetcher.fetch(parsed.id.trim(), max_chars).await?;
        serde_json::to_value(&document).map_err(|e| ToolError::Internal(e.to_string()))
    }
}

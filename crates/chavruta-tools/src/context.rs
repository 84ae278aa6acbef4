use std::sync::Arc;
use std::time::Duration;

use chavruta_cache::ResponseCache;
use chavruta_sefaria::SefariaClient;
use sha2::{Digest, Sha256};

/// Shared dependencies handed to every corpus tool
///
/// Per-tool metrics are observed by the transport around `invoke`,
/// not in here.
pub struct ToolContext {
    pub sefaria: SefariaClient,
    pub cache: Arc<ResponseCache>,
    /// Default response TTL (`CACHE_TTL_MS`)
    pub default_ttl: Duration,
}

impl ToolContext {
    pub fn new(sefaria: SefariaClient, cache: Arc<ResponseCache>, default_ttl: Duration) -> Self {
        Self {
            sefaria,
            cache,
            default_ttl,
        }
    }

    /// Deterministic cache key over a tool name and its full arguments
    ///
    /// `serde_json` maps are key-sorted, so equal argument sets hash
    /// equally regardless of caller field order.
    pub fn cache_key(tool: &str, args: &serde_json::Value) -> String {
        let mut hasher = Sha256::new();
        hasher.update(tool.as_bytes());
        hasher.update(b":");
        hasher.update(args.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

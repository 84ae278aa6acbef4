use crate::env;

/// Shared cache sizing
#[derive(Debug)]
pub struct CacheConfig {
    /// Default response cache TTL in milliseconds (`CACHE_TTL_MS`)
    pub ttl_ms: u64,
    /// Web fetch cache entry cap (`WEB_CACHE_MAX_ENTRIES`)
    pub web_cache_max_entries: usize,
}

impl CacheConfig {
    pub fn from_env() -> Self {
        Self {
            ttl_ms: env::clamped("CACHE_TTL_MS", 300_000, 10_000, 3_600_000),
            web_cache_max_entries: env::clamped("WEB_CACHE_MAX_ENTRIES", 200, 10, 2_000),
        }
    }
}

use secrecy::SecretString;

use crate::env;

/// HTTP host configuration
#[derive(Debug)]
pub struct ServerConfig {
    /// Listen port (`PORT`)
    pub port: u16,
    /// Optional shared API key; when set, every MCP route requires a
    /// matching `X-API-Key` header (`MCP_API_KEY`)
    pub api_key: Option<SecretString>,
    /// Requests allowed per window per client IP (`MCP_RATE_LIMIT_MAX`)
    pub rate_limit_max: u32,
    /// Rate limit window in milliseconds (`MCP_RATE_LIMIT_WINDOW_MS`)
    pub rate_limit_window_ms: u64,
    /// Log filter directive (`LOG_LEVEL`)
    pub log_level: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::clamped("PORT", 3000, 1, u16::MAX),
            api_key: env::opt_string("MCP_API_KEY").map(SecretString::from),
            rate_limit_max: env::clamped("MCP_RATE_LIMIT_MAX", 60, 1, 100_000),
            rate_limit_window_ms: env::clamped("MCP_RATE_LIMIT_WINDOW_MS", 60_000, 1_000, 3_600_000),
            log_level: env::string("LOG_LEVEL", "info"),
        }
    }
}

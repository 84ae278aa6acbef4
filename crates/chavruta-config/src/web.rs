use secrecy::SecretString;

use crate::env;

/// Web research configuration: fetch limits, host policy, providers
#[derive(Debug)]
pub struct WebConfig {
    /// Search result cap (`WEB_MAX_RESULTS`, 1–25)
    pub max_results: usize,
    /// Response body cap in bytes (`WEB_MAX_BYTES`, 50k–10MiB)
    pub max_bytes: usize,
    /// Extracted text cap in characters (`WEB_MAX_CHARS`, 5k–1M)
    pub max_chars: usize,
    /// Per-attempt fetch timeout (`WEB_TIMEOUT_MS`, 3k–60k)
    pub timeout_ms: u64,
    /// Global in-flight fetch cap (`WEB_MAX_CONCURRENCY`, 1–16)
    pub max_concurrency: usize,
    /// Per-host in-flight fetch cap (`WEB_PER_HOST_CONCURRENCY`, 1–8)
    pub per_host_concurrency: usize,
    /// If non-empty, only these hosts (and their subdomains) may be
    /// fetched (`WEB_ALLOWLIST`)
    pub allowlist: Vec<String>,
    /// Hosts (and their subdomains) that may never be fetched
    /// (`WEB_BLOCKLIST`)
    pub blocklist: Vec<String>,
    /// Skip the reserved-address rejection (`WEB_ALLOW_PRIVATE`).
    /// Exists for test rigs fetching from loopback mocks; never enable
    /// in production.
    pub allow_private: bool,
    /// Whether to honor robots.txt (`ROBOTS_OBEY`)
    pub robots_obey: bool,
    /// User agent string used for fetches and robots matching
    /// (`ROBOTS_USER_AGENT`)
    pub robots_user_agent: String,
    pub tavily_api_key: Option<SecretString>,
    pub serpapi_key: Option<SecretString>,
    pub brave_api_key: Option<SecretString>,
}

impl WebConfig {
    pub fn from_env() -> Self {
        Self {
            max_results: env::clamped("WEB_MAX_RESULTS", 10, 1, 25),
            max_bytes: env::clamped("WEB_MAX_BYTES", 2 * 1024 * 1024, 50_000, 10 * 1024 * 1024),
            max_chars: env::clamped("WEB_MAX_CHARS", 100_000, 5_000, 1_000_000),
            timeout_ms: env::clamped("WEB_TIMEOUT_MS", 12_000, 3_000, 60_000),
            max_concurrency: env::clamped("WEB_MAX_CONCURRENCY", 4, 1, 16),
            per_host_concurrency: env::clamped("WEB_PER_HOST_CONCURRENCY", 2, 1, 8),
            allowlist: env::list("WEB_ALLOWLIST"),
            blocklist: env::list("WEB_BLOCKLIST"),
            allow_private: env::flag("WEB_ALLOW_PRIVATE", false),
            robots_obey: env::flag("ROBOTS_OBEY", true),
            robots_user_agent: env::string("ROBOTS_USER_AGENT", "ChavrutaBot/0.4"),
            tavily_api_key: env::opt_string("TAVILY_API_KEY").map(SecretString::from),
            serpapi_key: env::opt_string("SERPAPI_KEY").map(SecretString::from),
            brave_api_key: env::opt_string("BRAVE_API_KEY").map(SecretString::from),
        }
    }
}

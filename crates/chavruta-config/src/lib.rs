#![allow(clippy::must_use_candidate)]

//! Environment-derived configuration
//!
//! Every recognized option comes from the process environment. Numeric
//! options are clamped into their documented ranges; unparseable
//! values fall back to the default with a startup warning.

mod cache;
mod env;
mod server;
mod web;

pub use cache::CacheConfig;
pub use server::ServerConfig;
pub use web::WebConfig;

/// Default Sefaria API base
pub const DEFAULT_SEFARIA_API_BASE: &str = "https://www.sefaria.org/api";

/// Top-level configuration
#[derive(Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub web: WebConfig,
    pub cache: CacheConfig,
    /// Upstream corpus API base, overridable for tests
    pub sefaria_api_base: String,
}

impl Config {
    /// Assemble the configuration from the environment
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env(),
            web: WebConfig::from_env(),
            cache: CacheConfig::from_env(),
            sefaria_api_base: env::string("SEFARIA_API_BASE", DEFAULT_SEFARIA_API_BASE),
        }
    }
}

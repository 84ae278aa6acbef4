#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

//! Hardened web research: SSRF-checked fetching with content
//! extraction, a multi-provider search front, and concurrency gates

pub mod extract;
pub mod fetcher;
pub mod gates;
pub mod providers;
pub mod robots;
pub mod ssrf;
pub mod tools;

mod error;

pub use error::WebError;
pub use fetcher::WebFetcher;
pub use providers::SearchProviders;
pub use ssrf::HostPolicy;

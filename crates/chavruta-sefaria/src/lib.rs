#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

//! Typed client for the Sefaria API plus the reference resolver
//!
//! Wraps the upstream endpoints the aggregation tools depend on
//! (texts, search, related, calendars, find-refs, topics, sheets)
//! with retry/backoff and per-attempt timeouts, and handles the
//! upstream's JSON shape quirks (arbitrarily nested text arrays,
//! HTML in titles, alternate key names).

pub mod client;
pub mod resolver;
pub mod text;
pub mod types;

mod error;

pub use client::SefariaClient;
pub use error::SefariaError;

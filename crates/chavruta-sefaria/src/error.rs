use thiserror::Error;

/// Errors from the upstream corpus API
#[derive(Debug, Error)]
pub enum SefariaError {
    /// Upstream returned a non-2xx status (after retries)
    #[error("sefaria returned {status}: {preview}")]
    Upstream { status: u16, preview: String },

    /// Transport-level failure (after retries)
    #[error("sefaria request failed: {0}")]
    Request(String),

    /// Per-attempt timeout elapsed (after retries)
    #[error("sefaria request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Response body did not match the expected shape
    #[error("sefaria response decode failed: {0}")]
    Decode(String),
}

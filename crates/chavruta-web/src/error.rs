use chavruta_core::SurfaceError;
use http::StatusCode;
use thiserror::Error;

/// Errors from the web fetch pipeline
#[derive(Debug, Error)]
pub enum WebError {
    /// The URL failed to parse or carried forbidden parts
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Refused by host policy, SSRF defense or robots.txt
    #[error("blocked by policy: {0}")]
    Blocked(String),

    /// Per-attempt timeout elapsed
    #[error("fetch timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Upstream returned a non-success status
    #[error("upstream returned {status}")]
    Status { status: u16 },

    /// Transport-level failure
    #[error("request failed: {0}")]
    Request(String),

    /// Body could not be turned into text
    #[error("content extraction failed: {0}")]
    Extract(String),
}

impl SurfaceError for WebError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            Self::Blocked(_) => StatusCode::FORBIDDEN,
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Status { .. } | Self::Request(_) | Self::Extract(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::InvalidUrl(_) => "invalid_request_error",
            Self::Blocked(_) => "policy_error",
            Self::Timeout { .. } => "timeout_error",
            Self::Status { .. } | Self::Request(_) => "upstream_error",
            Self::Extract(_) => "extraction_error",
        }
    }

    fn client_message(&self) -> String {
        self.to_string()
    }
}

impl From<WebError> for chavruta_tools::ToolError {
    fn from(e: WebError) -> Self {
        match e {
            WebError::InvalidUrl(m) => Self::InvalidInput(format!("invalid url: {m}")),
            WebError::Blocked(m) => Self::Blocked(m),
            other => Self::Upstream(other.to_string()),
        }
    }
}

use chavruta_core::SurfaceError;
use chavruta_sefaria::SefariaError;
use http::StatusCode;
use thiserror::Error;

/// Errors surfaced by tool invocations
#[derive(Debug, Error)]
pub enum ToolError {
    /// Bad or missing argument; rejected before any upstream work
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The request was refused by policy (host filters, SSRF, robots)
    #[error("blocked by policy: {0}")]
    Blocked(String),

    /// Upstream call failed after retries
    #[error("upstream error: {0}")]
    Upstream(String),

    /// A required upstream artifact was missing
    #[error("not found: {0}")]
    NotFound(String),

    /// Unexpected internal failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<SefariaError> for ToolError {
    fn from(e: SefariaError) -> Self {
        Self::Upstream(e.to_string())
    }
}

impl SurfaceError for ToolError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Blocked(_) => StatusCode::FORBIDDEN,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::InvalidInput(_) => "invalid_request_error",
            Self::Blocked(_) => "policy_error",
            Self::Upstream(_) => "upstream_error",
            Self::NotFound(_) => "not_found_error",
            Self::Internal(_) => "internal_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Internal(_) => "an internal error occurred".to_owned(),
            other => other.to_string(),
        }
    }
}

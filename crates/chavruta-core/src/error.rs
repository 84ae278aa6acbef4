use http::StatusCode;

/// Domain errors that can leave the process on either transport
///
/// Failures surface through two doors: plain HTTP responses on the
/// host routes (`/image-proxy`, the SSE sidecar) and JSON-RPC error
/// objects on the MCP endpoints. Implementors describe the failure
/// once; each layer derives its wire shape from that description
/// instead of matching on concrete error enums.
pub trait SurfaceError: std::error::Error {
    /// Status used when the error answers a plain HTTP request
    fn status_code(&self) -> StatusCode;

    /// Machine-readable kind, e.g. `invalid_request_error` or
    /// `policy_error`
    fn error_type(&self) -> &str;

    /// Wording safe to hand to API consumers (internal details are
    /// collapsed to a generic message)
    fn client_message(&self) -> String;

    /// Code used when the error rides inside a JSON-RPC envelope
    ///
    /// Rejected input maps to the protocol's invalid-params code; any
    /// other failure lands in the server-defined range as a tool
    /// error.
    fn jsonrpc_code(&self) -> i64 {
        if self.status_code() == StatusCode::BAD_REQUEST {
            -32602
        } else {
            -32000
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Stub(StatusCode);

    impl fmt::Display for Stub {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "stub")
        }
    }

    impl std::error::Error for Stub {}

    impl SurfaceError for Stub {
        fn status_code(&self) -> StatusCode {
            self.0
        }
        fn error_type(&self) -> &str {
            "stub_error"
        }
        fn client_message(&self) -> String {
            "stub".to_owned()
        }
    }

    #[test]
    fn bad_input_maps_to_invalid_params() {
        assert_eq!(Stub(StatusCode::BAD_REQUEST).jsonrpc_code(), -32602);
    }

    #[test]
    fn other_failures_map_to_the_tool_error_range() {
        assert_eq!(Stub(StatusCode::BAD_GATEWAY).jsonrpc_code(), -32000);
        assert_eq!(Stub(StatusCode::FORBIDDEN).jsonrpc_code(), -32000);
        assert_eq!(Stub(StatusCode::INTERNAL_SERVER_ERROR).jsonrpc_code(), -32000);
    }
}

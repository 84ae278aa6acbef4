use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use secrecy::{ExposeSecret, SecretString};

/// Shared-key gate for the MCP routes
///
/// When `MCP_API_KEY` is configured, every MCP route requires a
/// matching `X-API-Key` header; `/healthz` and `/dashboard` stay
/// public.
pub async fn api_key_middleware(expected: SecretString, request: Request, next: Next) -> Response {
    let path = request.uri().path();
    if !(path == "/mcp" || path == "/mcp-web" || path.starts_with("/mcp/") || path.starts_with("/mcp-web/")) {
        return next.run(request).await;
    }

    let presented = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok());

    match presented {
        Some(key) if key == expected.expose_secret() => next.run(request).await,
        _ => {
            tracing::warn!(path, "request rejected: missing or wrong API key");
            (StatusCode::UNAUTHORIZED, "invalid API key").into_response()
        }
    }
}

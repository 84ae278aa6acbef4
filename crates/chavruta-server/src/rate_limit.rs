use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chavruta_ratelimit::{RateLimitError, RequestLimiter};
use http::{HeaderValue, StatusCode};

/// Fallback key when no client IP header is present (direct
/// connections, tests)
const LOCAL_CLIENT: &str = "local";

/// Per-IP rate limiting for the MCP routes
///
/// `/healthz`, `/dashboard` and the other host routes pass through.
pub async fn rate_limit_middleware(limiter: RequestLimiter, request: Request, next: Next) -> Response {
    if !is_mcp_path(request.uri().path()) {
        return next.run(request).await;
    }

    let client = extract_client_ip(&request).unwrap_or_else(|| LOCAL_CLIENT.to_owned());

    match limiter.check_ip(&client) {
        Ok(()) => {
            let mut response = next.run(request).await;
            apply_limit_headers(&limiter, response.headers_mut());
            response
        }
        Err(RateLimitError::Exceeded { retry_after }) => {
            tracing::debug!(client = %client, retry_after, "rate limit exceeded");
            let body = serde_json::json!({
                "error": {
                    "type": "rate_limit_error",
                    "message": format!("rate limit exceeded, retry after {retry_after}s"),
                }
            });
            let mut response = (StatusCode::TOO_MANY_REQUESTS, axum::Json(body)).into_response();
            let headers = response.headers_mut();
            apply_limit_headers(&limiter, headers);
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                headers.insert("retry-after", value.clone());
                headers.insert("ratelimit-reset", value);
            }
            headers.insert("ratelimit-remaining", HeaderValue::from_static("0"));
            response
        }
        Err(e) => {
            tracing::error!(error = %e, "rate limiter failure");
            (StatusCode::INTERNAL_SERVER_ERROR, "rate limiter error").into_response()
        }
    }
}

fn is_mcp_path(path: &str) -> bool {
    path == "/mcp" || path == "/mcp-web" || path.starts_with("/mcp/") || path.starts_with("/mcp-web/")
}

fn apply_limit_headers(limiter: &RequestLimiter, headers: &mut http::HeaderMap) {
    if let Ok(value) = HeaderValue::from_str(&limiter.max_requests().to_string()) {
        headers.insert("ratelimit-limit", value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!(
        "{};w={}",
        limiter.max_requests(),
        limiter.window().as_secs()
    )) {
        headers.insert("ratelimit-policy", value);
    }
}

fn extract_client_ip(request: &Request) -> Option<String> {
    // Try X-Forwarded-For first
    if let Some(forwarded) = request.headers().get("x-forwarded-for")
        && let Ok(value) = forwarded.to_str()
        && let Some(first) = value.split(',').next()
    {
        return Some(first.trim().to_string());
    }

    // Try X-Real-IP
    if let Some(real_ip) = request.headers().get("x-real-ip")
        && let Ok(value) = real_ip.to_str()
    {
        return Some(value.trim().to_string());
    }

    None
}

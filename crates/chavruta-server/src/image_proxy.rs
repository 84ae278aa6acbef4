use std::collections::HashMap;

use axum::Router;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use chavruta_core::SurfaceError;
use http::{HeaderValue, StatusCode, header};

use crate::AppState;

/// `GET /image-proxy?url=…`
///
/// Runs the same safety pipeline as the web fetcher and relays the
/// body only when the upstream says it is an image.
pub fn router(state: AppState) -> Router {
    Router::new().route("/image-proxy", get(image_proxy)).with_state(state)
}

async fn image_proxy(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(url) = params.get("url") else {
        return (StatusCode::BAD_REQUEST, "missing url parameter").into_response();
    };

    let (bytes, content_type) = match state.fetcher.fetch_raw(url).await {
        Ok(result) => result,
        Err(e) => {
            return (e.status_code(), e.client_message()).into_response();
        }
    };

    if !content_type.to_ascii_lowercase().starts_with("image/") {
        return (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            format!("not an image: {content_type}"),
        )
            .into_response();
    }

    let mut response = bytes.into_response();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=600"),
    );
    response
}

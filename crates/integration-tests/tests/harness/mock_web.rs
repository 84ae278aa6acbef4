//! Mock web origin for fetcher tests: robots, revalidation, redirects

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use tokio_util::sync::CancellationToken;

const PAGE_ETAG: &str = "\"page-v1\"";

const PAGE_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <title>Fallback</title>
  <meta property="og:title" content="Mock Article">
  <meta property="og:url" content="https://mock.example/article">
</head>
<body>
  <article>
    <p>First paragraph of the mock article.</p>
    <p>Second paragraph with more words.</p>
  </article>
</body>
</html>"#;

/// Minimal PNG header so the body sniffs as an image
const PNG_BYTES: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

pub struct MockWeb {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockWebState>,
}

struct MockWebState {
    /// Full (non-304) page responses served
    page_full_count: AtomicU32,
    /// 304 responses served
    page_not_modified_count: AtomicU32,
}

impl MockWeb {
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(MockWebState {
            page_full_count: AtomicU32::new(0),
            page_not_modified_count: AtomicU32::new(0),
        });

        let app = Router::new()
            .route("/robots.txt", get(robots))
            .route("/page.html", get(page))
            .route("/plain.txt", get(plain))
            .route("/private/secret.html", get(secret))
            .route("/redirect", get(redirect))
            .route("/loop", get(redirect_loop))
            .route("/image.png", get(image))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn page_full_count(&self) -> u32 {
        self.state.page_full_count.load(Ordering::Relaxed)
    }

    pub fn page_not_modified_count(&self) -> u32 {
        self.state.page_not_modified_count.load(Ordering::Relaxed)
    }
}

impl Drop for MockWeb {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn robots() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain")],
        "User-agent: *\nDisallow: /private/\n",
    )
}

async fn page(State(state): State<Arc<MockWebState>>, headers: HeaderMap) -> impl IntoResponse {
    let revalidation = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|etag| etag == PAGE_ETAG);

    if revalidation {
        state.page_not_modified_count.fetch_add(1, Ordering::Relaxed);
        return (StatusCode::NOT_MODIFIED, [(header::ETAG, PAGE_ETAG)], "").into_response();
    }

    state.page_full_count.fetch_add(1, Ordering::Relaxed);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::ETAG, PAGE_ETAG),
        ],
        PAGE_HTML,
    )
        .into_response()
}

async fn plain() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], "plain text body\nwith two lines")
}

async fn secret() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/html")], "<p>should never be served</p>")
}

async fn redirect() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/page.html")], "")
}

async fn redirect_loop() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/loop")], "")
}

async fn image() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/png")], PNG_BYTES)
}

use axum::extract::State;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::StatusCode;
use serde::Deserialize;

use crate::AppState;

/// Public host routes: health snapshot, chain heartbeat, dashboard
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/health/python", post(python_heartbeat))
        .route("/dashboard", get(dashboard))
        .with_state(state)
}

/// `GET /healthz`: the metrics snapshot
async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot(state.cache.len()))
}

#[derive(Debug, Deserialize)]
struct HeartbeatBody {
    status: String,
}

/// `POST /health/python`: downstream chain liveness report
async fn python_heartbeat(
    State(state): State<AppState>,
    Json(body): Json<HeartbeatBody>,
) -> impl IntoResponse {
    if !matches!(body.status.as_str(), "ok" | "error") {
        return (StatusCode::BAD_REQUEST, "status must be \"ok\" or \"error\"").into_response();
    }
    state.metrics.set_python_heartbeat(&body.status);
    StatusCode::NO_CONTENT.into_response()
}

/// `GET /dashboard`: static page polling `/healthz`
async fn dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

const DASHBOARD_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>chavruta dashboard</title>
  <style>
    body { font-family: ui-monospace, monospace; margin: 2rem; background: #111; color: #ddd; }
    h1 { font-size: 1.2rem; }
    table { border-collapse: collapse; margin-top: 1rem; }
    td, th { border: 1px solid #444; padding: 0.3rem 0.8rem; text-align: left; }
    #raw { margin-top: 1.5rem; white-space: pre; font-size: 0.8rem; color: #8a8; }
  </style>
</head>
<body>
  <h1>chavruta gateway</h1>
  <table>
    <tr><th>Total requests</th><td id="total">–</td></tr>
    <tr><th>Avg latency (ms)</th><td id="latency">–</td></tr>
    <tr><th>Errors</th><td id="errors">–</td></tr>
    <tr><th>Cache entries</th><td id="cache">–</td></tr>
    <tr><th>Web fetches</th><td id="fetches">–</td></tr>
    <tr><th>Chain heartbeat</th><td id="chain">–</td></tr>
  </table>
  <div id="raw"></div>
  <script>
    async function refresh() {
      try {
        const res = await fetch('/healthz');
        const snap = await res.json();
        document.getElementById('total').textContent = snap.totalRequests;
        document.getElementById('latency').textContent =
          snap.latCount ? (snap.latSumMs / snap.latCount).toFixed(1) : '–';
        document.getElementById('errors').textContent = snap.errors;
        document.getElementById('cache').textContent = snap.cacheSize;
        document.getElementById('fetches').textContent = snap.counters.fetches;
        document.getElementById('chain').textContent =
          snap.pythonChainHeartbeat ? snap.pythonChainHeartbeat.status : 'none';
        document.getElementById('raw').textContent = JSON.stringify(snap, null, 2);
      } catch (err) {
        document.getElementById('raw').textContent = 'healthz unreachable: ' + err;
      }
    }
    refresh();
    setInterval(refresh, 5000);
  </script>
</body>
</html>
"#;

//! Axum routes for one MCP server prefix

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use futures_util::Stream;
use http::StatusCode;
use serde_json::Value;

use crate::server::McpServer;
use crate::session::{OutboundMessage, SessionRegistry};

/// Shared state for one mounted MCP server
#[derive(Clone)]
pub struct McpEndpoint {
    pub server: Arc<McpServer>,
    pub sessions: Arc<SessionRegistry>,
    /// Path advertised to SSE clients for client→server messages
    /// (e.g. `/mcp/messages`)
    pub messages_path: String,
}

/// Mount one MCP server under `prefix`: JSON-RPC at the prefix itself,
/// the SSE stream at `/sse`, and the session sidecar at `/messages`
pub fn mcp_router(server: Arc<McpServer>, sessions: Arc<SessionRegistry>, prefix: &str) -> Router {
    let endpoint = McpEndpoint {
        server,
        sessions,
        messages_path: format!("{prefix}/messages"),
    };

    Router::new()
        .route(prefix, post(handle_json))
        .route(&format!("{prefix}/sse"), get(handle_sse))
        .route(&format!("{prefix}/messages"), post(handle_messages))
        .with_state(endpoint)
}

/// `POST {prefix}`: one JSON-RPC exchange
async fn handle_json(State(endpoint): State<McpEndpoint>, body: String) -> Response {
    let raw: Value = match serde_json::from_str(&body) {
        Ok(raw) => raw,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                axum::Json(serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": null,
                    "error": {"code": crate::protocol::PARSE_ERROR, "message": format!("invalid JSON: {e}")},
                })),
            )
                .into_response();
        }
    };

    match endpoint.server.handle(raw).await {
        Some(response) => axum::Json(response).into_response(),
        // A notification: nothing to send back
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// `GET {prefix}/sse`: open a session stream
///
/// The first event is the MCP `endpoint` event naming the sidecar URL
/// for this session; afterwards the stream carries JSON-RPC responses
/// and heartbeat notifications.
async fn handle_sse(
    State(endpoint): State<McpEndpoint>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (session_id, receiver) = endpoint.sessions.open();
    let endpoint_url = format!("{}?sessionId={session_id}", endpoint.messages_path);

    let hello = futures_util::stream::once(async move {
        Ok(Event::default().event("endpoint").data(endpoint_url))
    });

    let messages = futures_util::stream::unfold(receiver, |mut receiver| async move {
        receiver
            .recv()
            .await
            .map(|message: OutboundMessage| (Ok(Event::default().event(message.event).data(message.data)), receiver))
    });

    Sse::new(futures_util::StreamExt::chain(hello, messages)).keep_alive(KeepAlive::default())
}

/// `POST {prefix}/messages?sessionId=…`: one client→server message
async fn handle_messages(
    State(endpoint): State<McpEndpoint>,
    Query(params): Query<HashMap<String, String>>,
    body: String,
) -> Response {
    let Some(session_id) = params.get("sessionId") else {
        return (StatusCode::BAD_REQUEST, "missing sessionId").into_response();
    };
    let Some(sender) = endpoint.sessions.sender(session_id) else {
        return (StatusCode::NOT_FOUND, "unknown session").into_response();
    };

    let raw: Value = match serde_json::from_str(&body) {
        Ok(raw) => raw,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, format!("invalid JSON: {e}")).into_response();
        }
    };

    if let Some(response) = endpoint.server.handle(raw).await {
        let message = OutboundMessage {
            event: "message",
            data: response.to_string(),
        };
        if sender.send(message).await.is_err() {
            // Stream went away between lookup and delivery
            endpoint.sessions.remove(session_id);
            return (StatusCode::NOT_FOUND, "session closed").into_response();
        }
    }

    StatusCode::ACCEPTED.into_response()
}

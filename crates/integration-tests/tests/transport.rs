//! MCP transport tests: JSON mode and the SSE session channel

mod harness;

use std::time::Duration;

use futures_util::StreamExt;
use harness::{MockSefaria, TestServer, test_config};
use serde_json::json;

async fn setup() -> (MockSefaria, TestServer) {
    let mock = MockSefaria::start().await.expect("mock sefaria");
    let server = TestServer::start(test_config(&mock.base_url())).await.expect("gateway");
    (mock, server)
}

/// Incrementally read SSE events (`event:`/`data:` pairs) off a byte stream
struct SseReader<S> {
    stream: S,
    buffer: String,
}

impl<S> SseReader<S>
where
    S: futures_util::Stream<Item = reqwest::Result<bytes::Bytes>> + Unpin,
{
    fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: String::new(),
        }
    }

    async fn next_event(&mut self) -> Option<(String, String)> {
        loop {
            if let Some(boundary) = self.buffer.find("\n\n") {
                let raw = self.buffer[..boundary].to_owned();
                self.buffer.drain(..boundary + 2);

                let mut event = String::new();
                let mut data = Vec::new();
                for line in raw.lines() {
                    if let Some(value) = line.strip_prefix("event:") {
                        event = value.trim().to_owned();
                    } else if let Some(value) = line.strip_prefix("data:") {
                        data.push(value.trim().to_owned());
                    }
                }
                if !event.is_empty() || !data.is_empty() {
                    return Some((event, data.join("\n")));
                }
                continue;
            }

            let chunk = tokio::time::timeout(Duration::from_secs(5), self.stream.next())
                .await
                .ok()??
                .ok()?;
            self.buffer.push_str(&String::from_utf8_lossy(&chunk));
        }
    }
}

#[tokio::test]
async fn json_mode_initialize_round_trip() {
    let (_mock, server) = setup().await;

    let response = server
        .rpc("/mcp", json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}))
        .await
        .unwrap();
    assert_eq!(response["jsonrpc"], "2.0");
    assert_eq!(response["id"], 1);
    assert_eq!(response["result"]["serverInfo"]["name"], "chavruta-sefaria");

    let response = server
        .rpc("/mcp-web", json!({"jsonrpc": "2.0", "id": 2, "method": "initialize"}))
        .await
        .unwrap();
    assert_eq!(response["result"]["serverInfo"]["name"], "chavruta-web");
}

#[tokio::test]
async fn json_mode_rejects_malformed_bodies() {
    let (_mock, server) = setup().await;

    let response = server
        .client()
        .post(server.url("/mcp"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    // Wrong jsonrpc version gets a JSON-RPC error envelope
    let response = server
        .rpc("/mcp", json!({"jsonrpc": "1.0", "id": 1, "method": "tools/list"}))
        .await
        .unwrap();
    assert_eq!(response["error"]["code"], -32600);
}

#[tokio::test]
async fn notifications_are_accepted_without_response() {
    let (_mock, server) = setup().await;

    let response = server
        .client()
        .post(server.url("/mcp"))
        .json(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 202);
}

#[tokio::test]
async fn sse_session_delivers_responses_on_the_stream() {
    let (_mock, server) = setup().await;

    let response = server.client().get(server.url("/mcp/sse")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let mut reader = SseReader::new(response.bytes_stream());

    // First event names the message sidecar with the session id
    let (event, endpoint) = reader.next_event().await.expect("endpoint event");
    assert_eq!(event, "endpoint");
    assert!(endpoint.starts_with("/mcp/messages?sessionId="), "got: {endpoint}");

    // Deliver an initialize through the sidecar
    let accepted = server
        .client()
        .post(server.url(&endpoint))
        .json(&json!({"jsonrpc": "2.0", "id": 7, "method": "initialize"}))
        .send()
        .await
        .unwrap();
    assert_eq!(accepted.status(), 202);

    // The response arrives on the stream
    let (event, data) = reader.next_event().await.expect("message event");
    assert_eq!(event, "message");
    let parsed: serde_json::Value = serde_json::from_str(&data).unwrap();
    assert_eq!(parsed["id"], 7);
    assert_eq!(parsed["result"]["serverInfo"]["name"], "chavruta-sefaria");
}

#[tokio::test]
async fn message_sidecar_validates_sessions() {
    let (_mock, server) = setup().await;

    // Missing sessionId
    let response = server
        .client()
        .post(server.url("/mcp/messages"))
        .json(&json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    // Unknown sessionId
    let response = server
        .client()
        .post(server.url("/mcp/messages?sessionId=not-a-session"))
        .json(&json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn corpus_and_web_sessions_are_independent() {
    let (_mock, server) = setup().await;

    let response = server.client().get(server.url("/mcp/sse")).send().await.unwrap();
    let mut reader = SseReader::new(response.bytes_stream());
    let (_, corpus_endpoint) = reader.next_event().await.expect("endpoint event");
    let session_id = corpus_endpoint.split('=').next_back().unwrap().to_owned();

    // A corpus session id is meaningless on the web transport
    let response = server
        .client()
        .post(server.url(&format!("/mcp-web/messages?sessionId={session_id}")))
        .json(&json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

//! Host-level behavior: health snapshot, dashboard, rate limit, API key

mod harness;

use harness::{MockSefaria, TestServer, test_config};
use secrecy::SecretString;
use serde_json::json;

async fn setup() -> (MockSefaria, TestServer) {
    let mock = MockSefaria::start().await.expect("mock sefaria");
    let server = TestServer::start(test_config(&mock.base_url())).await.expect("gateway");
    (mock, server)
}

async fn snapshot(server: &TestServer) -> serde_json::Value {
    server
        .client()
        .get(server.url("/healthz"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn healthz_tracks_requests_and_tools() {
    let (_mock, server) = setup().await;

    let before = snapshot(&server).await;
    let base_requests = before["totalRequests"].as_u64().unwrap();

    server
        .rpc("/mcp", json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
        .await
        .unwrap();
    server
        .call_tool("/mcp", "search", json!({"query": "Yoma 85b"}))
        .await
        .unwrap();

    let after = snapshot(&server).await;
    assert_eq!(after["totalRequests"].as_u64().unwrap(), base_requests + 2);
    assert_eq!(after["toolCounts"]["search"], 1);
    assert!(after["toolLatencies"]["search"]["count"].as_u64().unwrap() >= 1);
    assert!(after["latCount"].as_u64().unwrap() >= 2);
    // The search result was cached
    assert!(after["cacheSize"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn healthz_counts_tool_errors() {
    let (_mock, server) = setup().await;

    let before = snapshot(&server).await["errors"].as_u64().unwrap();
    server
        .call_tool("/mcp", "search", json!({"query": "x", "size": 0}))
        .await
        .unwrap();
    let after = snapshot(&server).await["errors"].as_u64().unwrap();
    assert_eq!(after, before + 1);
}

#[tokio::test]
async fn python_heartbeat_round_trips() {
    let (_mock, server) = setup().await;

    assert!(snapshot(&server).await.get("pythonChainHeartbeat").is_none());

    let response = server
        .client()
        .post(server.url("/health/python"))
        .json(&json!({"status": "ok"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    let heartbeat = snapshot(&server).await["pythonChainHeartbeat"].clone();
    assert_eq!(heartbeat["status"], "ok");
    assert!(!heartbeat["checkedAt"].as_str().unwrap().is_empty());

    // Only "ok" and "error" are meaningful
    let response = server
        .client()
        .post(server.url("/health/python"))
        .json(&json!({"status": "confused"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn dashboard_is_served() {
    let (_mock, server) = setup().await;

    let response = server.client().get(server.url("/dashboard")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("chavruta"));
    assert!(body.contains("/healthz"));
}

#[tokio::test]
async fn rate_limit_gates_mcp_routes_only() {
    let mock = MockSefaria::start().await.unwrap();
    let mut config = test_config(&mock.base_url());
    config.server.rate_limit_max = 3;
    let server = TestServer::start(config).await.unwrap();

    let body = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"});
    for _ in 0..3 {
        let response = server
            .client()
            .post(server.url("/mcp"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert!(response.headers().contains_key("ratelimit-limit"));
    }

    let response = server.client().post(server.url("/mcp")).json(&body).send().await.unwrap();
    assert_eq!(response.status(), 429);
    assert!(response.headers().contains_key("retry-after"));
    assert_eq!(response.headers()["ratelimit-remaining"], "0");

    // Public routes stay open
    let response = server.client().get(server.url("/healthz")).send().await.unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn api_key_gate_protects_mcp_routes() {
    let mock = MockSefaria::start().await.unwrap();
    let mut config = test_config(&mock.base_url());
    config.server.api_key = Some(SecretString::from("sesame".to_owned()));
    let server = TestServer::start(config).await.unwrap();

    let body = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"});

    let response = server.client().post(server.url("/mcp")).json(&body).send().await.unwrap();
    assert_eq!(response.status(), 401);

    let response = server
        .client()
        .post(server.url("/mcp"))
        .header("x-api-key", "wrong")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let response = server
        .client()
        .post(server.url("/mcp-web"))
        .header("x-api-key", "sesame")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // Health and dashboard remain public
    let response = server.client().get(server.url("/healthz")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let response = server.client().get(server.url("/dashboard")).send().await.unwrap();
    assert_eq!(response.status(), 200);
}

//! End-to-end tests for the web MCP endpoint and the image proxy

mod harness;

use harness::{MockSefaria, MockWeb, TestServer, test_config};
use serde_json::json;

async fn setup() -> (MockSefaria, MockWeb, TestServer) {
    let sefaria = MockSefaria::start().await.expect("mock sefaria");
    let web = MockWeb::start().await.expect("mock web");
    let server = TestServer::start(test_config(&sefaria.base_url())).await.expect("gateway");
    (sefaria, web, server)
}

async fn counters(server: &TestServer) -> serde_json::Value {
    server
        .client()
        .get(server.url("/healthz"))
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap()["counters"]
        .clone()
}

#[tokio::test]
async fn web_endpoint_exposes_the_research_pair() {
    let (_sefaria, _web, server) = setup().await;

    let response = server
        .rpc("/mcp-web", json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
        .await
        .unwrap();
    let tools: Vec<&str> = response["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(tools, vec!["search", "fetch"]);
}

#[tokio::test]
async fn fetch_extracts_html_documents() {
    let (_sefaria, web, server) = setup().await;

    let response = server
        .call_tool("/mcp-web", "fetch", json!({"id": web.url("/page.html")}))
        .await
        .unwrap();
    let document = &response["result"]["structuredContent"];

    assert_eq!(document["title"], "Mock Article");
    assert_eq!(document["metadata"]["canonicalUrl"], "https://mock.example/article");
    assert_eq!(document["metadata"]["language"], "en");
    assert_eq!(document["metadata"]["contentType"], "text/html");
    assert!(document["metadata"]["bytes"].as_u64().unwrap() > 0);

    let text = document["text"].as_str().unwrap();
    assert!(text.contains("First paragraph of the mock article."));
}

#[tokio::test]
async fn second_fetch_revalidates_and_hits_the_cache() {
    let (_sefaria, web, server) = setup().await;
    let url = web.url("/page.html");

    let first = server
        .call_tool("/mcp-web", "fetch", json!({"id": url}))
        .await
        .unwrap();
    let first_bytes = first["result"]["structuredContent"]["metadata"]["bytes"].as_u64().unwrap();
    let hits_before = counters(&server).await["cacheHits"].as_u64().unwrap();

    let second = server
        .call_tool("/mcp-web", "fetch", json!({"id": url}))
        .await
        .unwrap();
    let second_bytes = second["result"]["structuredContent"]["metadata"]["bytes"].as_u64().unwrap();

    assert_eq!(second_bytes, first_bytes);
    assert_eq!(web.page_full_count(), 1, "body must be served once");
    assert_eq!(web.page_not_modified_count(), 1, "second call revalidates");
    let hits_after = counters(&server).await["cacheHits"].as_u64().unwrap();
    assert_eq!(hits_after, hits_before + 1);
}

#[tokio::test]
async fn fetch_passes_plain_text_through() {
    let (_sefaria, web, server) = setup().await;

    let response = server
        .call_tool("/mcp-web", "fetch", json!({"id": web.url("/plain.txt")}))
        .await
        .unwrap();
    let document = &response["result"]["structuredContent"];
    assert_eq!(document["title"], "Untitled");
    assert!(document["text"].as_str().unwrap().contains("plain text body"));
}

#[tokio::test]
async fn fetch_honors_robots() {
    let (_sefaria, web, server) = setup().await;

    let response = server
        .call_tool("/mcp-web", "fetch", json!({"id": web.url("/private/secret.html")}))
        .await
        .unwrap();
    let message = response["error"]["message"].as_str().unwrap();
    assert!(message.contains("robots.txt"), "got: {message}");

    assert!(counters(&server).await["robotsBlocked"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn fetch_rejects_loopback_targets() {
    let sefaria = MockSefaria::start().await.unwrap();
    // Default posture: private networks refused
    let mut config = test_config(&sefaria.base_url());
    config.web.allow_private = false;
    let server = TestServer::start(config).await.unwrap();

    let response = server
        .call_tool("/mcp-web", "fetch", json!({"id": "http://127.0.0.1/"}))
        .await
        .unwrap();
    let message = response["error"]["message"].as_str().unwrap();
    assert!(message.contains("private or loopback"), "got: {message}");
}

#[tokio::test]
async fn fetch_rejects_localhost_and_credentials() {
    let (_sefaria, _web, server) = setup().await;

    let response = server
        .call_tool("/mcp-web", "fetch", json!({"id": "http://localhost/x"}))
        .await
        .unwrap();
    assert!(response["error"]["message"].as_str().unwrap().contains("private or loopback"));

    let response = server
        .call_tool("/mcp-web", "fetch", json!({"id": "https://user:pw@example.com/"}))
        .await
        .unwrap();
    assert!(response["error"]["message"].as_str().unwrap().contains("credentials"));
}

#[tokio::test]
async fn fetch_follows_redirects_and_breaks_cycles() {
    let (_sefaria, web, server) = setup().await;

    let response = server
        .call_tool("/mcp-web", "fetch", json!({"id": web.url("/redirect")}))
        .await
        .unwrap();
    let document = &response["result"]["structuredContent"];
    assert_eq!(document["title"], "Mock Article");
    assert!(document["url"].as_str().unwrap().ends_with("/page.html"));

    let response = server
        .call_tool("/mcp-web", "fetch", json!({"id": web.url("/loop")}))
        .await
        .unwrap();
    assert!(response["error"]["message"].as_str().unwrap().contains("cycle"));
}

#[tokio::test]
async fn fetch_truncates_to_max_chars() {
    let (_sefaria, web, server) = setup().await;

    let response = server
        .call_tool("/mcp-web", "fetch", json!({"id": web.url("/plain.txt"), "maxChars": 5}))
        .await
        .unwrap();
    let document = &response["result"]["structuredContent"];
    assert_eq!(document["text"].as_str().unwrap().chars().count(), 5);
    assert_eq!(document["metadata"]["truncated"], true);
}

#[tokio::test]
async fn search_with_no_providers_returns_empty() {
    let (_sefaria, _web, server) = setup().await;

    let response = server
        .call_tool("/mcp-web", "search", json!({"query": "anything at all"}))
        .await
        .unwrap();
    let results = response["result"]["structuredContent"]["results"].as_array().unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn search_rejects_bad_bounds() {
    let (_sefaria, _web, server) = setup().await;

    for max_results in [0, -3, 26] {
        let response = server
            .call_tool("/mcp-web", "search", json!({"query": "x", "maxResults": max_results}))
            .await
            .unwrap();
        assert!(response["error"]["message"].as_str().unwrap().contains("maxResults"));
    }
}

#[tokio::test]
async fn image_proxy_relays_images_only() {
    let (_sefaria, web, server) = setup().await;

    let response = server
        .client()
        .get(server.url("/image-proxy"))
        .query(&[("url", web.url("/image.png"))])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "image/png");
    assert_eq!(response.headers()["cache-control"], "public, max-age=600");
    let body = response.bytes().await.unwrap();
    assert_eq!(&body[..4], &[0x89, 0x50, 0x4E, 0x47]);

    // Non-image bodies are refused
    let response = server
        .client()
        .get(server.url("/image-proxy"))
        .query(&[("url", web.url("/page.html"))])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 415);

    // Missing parameter
    let response = server.client().get(server.url("/image-proxy")).send().await.unwrap();
    assert_eq!(response.status(), 400);
}

//! Test server wrapper that starts the gateway on a random port

use std::net::SocketAddr;

use chavruta_config::{CacheConfig, Config, ServerConfig, WebConfig};
use chavruta_server::Server;
use tokio_util::sync::CancellationToken;

/// A fully-permissive config pointing at a mock Sefaria base
pub fn test_config(sefaria_base: &str) -> Config {
    Config {
        server: ServerConfig {
            port: 0,
            api_key: None,
            rate_limit_max: 10_000,
            rate_limit_window_ms: 60_000,
            log_level: "warn".to_owned(),
        },
        web: WebConfig {
            max_results: 10,
            max_bytes: 2 * 1024 * 1024,
            max_chars: 100_000,
            timeout_ms: 5_000,
            max_concurrency: 4,
            per_host_concurrency: 2,
            allowlist: Vec::new(),
            blocklist: Vec::new(),
            allow_private: true,
            robots_obey: true,
            robots_user_agent: "ChavrutaBot/0.4".to_owned(),
            tavily_api_key: None,
            serpapi_key: None,
            brave_api_key: None,
        },
        cache: CacheConfig {
            ttl_ms: 60_000,
            web_cache_max_entries: 50,
        },
        sefaria_api_base: sefaria_base.to_owned(),
    }
}

/// A running gateway instance
pub struct TestServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    client: reqwest::Client,
}

impl TestServer {
    /// Start the gateway with the given configuration on port 0
    pub async fn start(config: Config) -> anyhow::Result<Self> {
        let server = Server::new(&config)?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        // Bind the listener here so we know the actual port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        tokio::spawn(async move {
            axum::serve(listener, server.into_router())
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        let client = reqwest::Client::new();

        Ok(Self { addr, shutdown, client })
    }

    /// Base URL of the running test server
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Get a reference to the HTTP client
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Issue one JSON-RPC request against an MCP endpoint
    pub async fn rpc(&self, path: &str, body: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        let response = self.client.post(self.url(path)).json(&body).send().await?;
        Ok(response.json().await?)
    }

    /// Call a tool and return the parsed envelope
    pub async fn call_tool(
        &self,
        path: &str,
        name: &str,
        arguments: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        self.rpc(
            path,
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "tools/call",
                "params": {"name": name, "arguments": arguments},
            }),
        )
        .await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

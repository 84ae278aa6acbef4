//! HTTP host: wires both MCP servers, middleware and the public routes

mod auth;
mod health;
mod image_proxy;
mod rate_limit;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use chavruta_cache::ResponseCache;
use chavruta_config::Config;
use chavruta_mcp::{McpServer, SessionRegistry, mcp_router};
use chavruta_sefaria::SefariaClient;
use chavruta_telemetry::Metrics;
use chavruta_tools::ToolContext;
use chavruta_web::{SearchProviders, WebFetcher};
use tower_http::trace::TraceLayer;

/// Shared handles for the host-level routes
#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<Metrics>,
    pub cache: Arc<ResponseCache>,
    pub fetcher: Arc<WebFetcher>,
}

/// Assembled server with all routes and middleware
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
}

/// Response cache capacity (entries)
const RESPONSE_CACHE_CAPACITY: usize = 500;

impl Server {
    /// Build the server from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a subsystem (upstream client, web fetcher,
    /// providers, rate limiter) fails to construct.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let listen_address = SocketAddr::from(([0, 0, 0, 0], config.server.port));

        let metrics = Arc::new(Metrics::default());
        let cache = Arc::new(ResponseCache::new(RESPONSE_CACHE_CAPACITY));
        let default_ttl = Duration::from_millis(config.cache.ttl_ms);

        // Corpus side
        let sefaria = SefariaClient::new(&config.sefaria_api_base)?;
        let tool_ctx = Arc::new(ToolContext::new(sefaria, Arc::clone(&cache), default_ttl));
        let corpus_registry = chavruta_tools::corpus_registry(tool_ctx);
        let corpus_server = Arc::new(McpServer::new(
            "chavruta-sefaria",
            corpus_registry,
            Arc::clone(&metrics),
        ));
        let corpus_sessions = SessionRegistry::new("corpus");

        // Web side
        let fetcher = Arc::new(WebFetcher::new(&config.web, &config.cache, Arc::clone(&metrics))?);
        let providers = Arc::new(SearchProviders::new(
            config.web.tavily_api_key.clone(),
            config.web.serpapi_key.clone(),
            config.web.brave_api_key.clone(),
        )?);
        let web_registry = chavruta_web::tools::web_registry(
            providers,
            Arc::clone(&fetcher),
            Arc::clone(&cache),
            default_ttl,
            config.web.max_results,
        );
        let web_server = Arc::new(McpServer::new("chavruta-web", web_registry, Arc::clone(&metrics)));
        let web_sessions = SessionRegistry::new("web");

        tracing::info!(
            corpus = corpus_server.name(),
            web = web_server.name(),
            sefaria_base = %config.sefaria_api_base,
            "mcp servers initialized"
        );

        let state = AppState {
            metrics: Arc::clone(&metrics),
            cache,
            fetcher,
        };

        let mut app = Router::new()
            .merge(mcp_router(corpus_server, corpus_sessions, "/mcp"))
            .merge(mcp_router(web_server, web_sessions, "/mcp-web"))
            .merge(health::router(state.clone()))
            .merge(image_proxy::router(state));

        // API key gate on the MCP routes
        if let Some(ref api_key) = config.server.api_key {
            let expected = api_key.clone();
            app = app.layer(axum::middleware::from_fn(move |req, next| {
                let expected = expected.clone();
                async move { auth::api_key_middleware(expected, req, next).await }
            }));
        }

        // Per-IP rate limiting on the MCP routes
        let limiter = chavruta_ratelimit::RequestLimiter::new(
            config.server.rate_limit_max,
            Duration::from_millis(config.server.rate_limit_window_ms),
        )?;
        app = app.layer(axum::middleware::from_fn(move |req, next| {
            let limiter = limiter.clone();
            async move { rate_limit::rate_limit_middleware(limiter, req, next).await }
        }));

        // Request tracing
        app = app.layer(TraceLayer::new_for_http());

        Ok(Self {
            router: app,
            listen_address,
        })
    }

    /// Address the gateway will bind, derived from `PORT`
    #[must_use]
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Tear the server down to its bare router
    ///
    /// The test harness binds port 0 itself and drives the router
    /// directly, so it never goes through [`Server::serve`].
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Bind and serve both MCP endpoints until `shutdown` fires
    ///
    /// In-flight requests and open SSE streams are drained before the
    /// call returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot bind or the accept
    /// loop fails.
    pub async fn serve(self, shutdown: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        tracing::info!(addr = %listener.local_addr()?, "gateway ready");

        let drain = async move {
            shutdown.cancelled().await;
            tracing::info!("shutdown requested, draining connections");
        };
        axum::serve(listener, self.router).with_graceful_shutdown(drain).await?;

        Ok(())
    }
}

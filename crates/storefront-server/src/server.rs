use std::{net::SocketAddr, sync::Arc};

use axum::Router;
use storefront_cache::HybridCache;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{config::AppConfig, routes, store::Catalog};

/// Shared application state handed to every route and middleware closure.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<HybridCache>,
    pub catalog: Arc<Catalog>,
}

impl AppState {
    pub fn new(cache: Arc<HybridCache>, catalog: Arc<Catalog>) -> Self {
        Self { cache, catalog }
    }
}

pub fn build_app(state: AppState) -> Router {
    routes::build_router(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri()
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub async fn build(self) -> StorefrontServer {
        let cache = crate::create_cache(&self.config.redis, &self.config.cache).await;
        let state = AppState::new(cache.clone(), Arc::new(Catalog::new()));

        StorefrontServer {
            addr: self.addr,
            app: build_app(state),
            cache,
        }
    }
}

pub struct StorefrontServer {
    addr: SocketAddr,
    app: Router,
    cache: Arc<HybridCache>,
}

impl StorefrontServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        // Drain the Redis pool after the last in-flight request completes.
        self.cache.close().await;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

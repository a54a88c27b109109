//! HTTP server for Game Hangar.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;

use super::handlers::AppState;
use super::middleware::RateLimitState;
use super::router::create_router;
use crate::config::ServerConfig;
use crate::{HangarError, Result};

/// Web server for the API.
pub struct WebServer {
    addr: SocketAddr,
    app_state: Arc<AppState>,
    config: ServerConfig,
}

impl WebServer {
    /// Create a new web server.
    pub fn new(config: &ServerConfig, app_state: Arc<AppState>) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| HangarError::Config(format!("invalid listen address: {e}")))?;
        Ok(Self {
            addr,
            app_state,
            config: config.clone(),
        })
    }

    /// Address the server binds to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until Ctrl-C, then finish in-flight requests.
    pub async fn run(self) -> Result<()> {
        let limiter = Arc::new(RateLimitState::new(self.config.login_rate_limit));
        limiter.clone().start_cleanup_task();

        let router = create_router(self.app_state, limiter, &self.config)
            .layer(CompressionLayer::new());

        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Web server listening on http://{}", local_addr);

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        tracing::info!("Web server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

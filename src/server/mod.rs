//! HTTP server for the relay

pub mod handlers;

use std::sync::Arc;

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::RelayConfig;
use self::handlers::AppState;

/// Relay HTTP server.
pub struct RelayServer {
    config: RelayConfig,
}

impl RelayServer {
    pub fn new(config: RelayConfig) -> Self {
        Self { config }
    }

    /// Build the router. Exposed separately so tests can drive the service
    /// without binding a socket.
    pub fn router(&self) -> Router {
        let state = AppState {
            config: Arc::new(self.config.clone()),
        };

        Router::new()
            .route("/", get(handlers::welcome))
            .route("/health", get(handlers::health))
            .route("/ping", get(handlers::ping))
            .route(
                "/invocations",
                post(handlers::invoke).options(handlers::preflight),
            )
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind and serve until the process is stopped.
    pub async fn serve(self) -> Result<()> {
        let addr = self.config.bind_addr();
        let app = self.router();

        info!(
            "starting MAGI relay on {addr} (worker: {} {})",
            self.config.worker_command,
            self.config.worker_args.join(" ")
        );

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }
}

//! HTTP server exposing the tracker

pub mod routes;
pub mod state;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::TrackerConfig;
use crate::error::{Error, Result};
use crate::providers::{DocumentActions, StatusClient};
use state::AppState;

/// Upload tracker HTTP server
pub struct TrackerServer {
    config: TrackerConfig,
    state: AppState,
}

impl TrackerServer {
    /// Create a server and start its tracker
    pub fn new(
        config: TrackerConfig,
        client: Arc<dyn StatusClient>,
        actions: Arc<dyn DocumentActions>,
    ) -> Self {
        let state = AppState::new(config.clone(), client, actions);
        Self { config, state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let router = Router::new()
            .route("/health", get(health_check))
            .route("/ready", get(readiness))
            .nest("/api", routes::api_routes())
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http());

        if self.config.server.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            router.layer(cors)
        } else {
            router
        }
    }

    /// Serve until Ctrl-C, then stop the tracker
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::config(format!("Invalid address: {}", e)))?;

        let router = self.build_router();

        tracing::info!("Starting upload tracker on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::internal(format!("Server error: {}", e)))?;

        self.state.set_ready(false);
        if let Err(e) = self.state.tracker().shutdown().await {
            tracing::debug!("Tracker already stopped: {}", e);
        }
        tracing::info!("Server stopped");
        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await
        }
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Readiness check endpoint
async fn readiness(state: axum::extract::State<AppState>) -> axum::http::StatusCode {
    if state.is_ready() {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    }
}

//! `VistaServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use axum::Router;
use axum::extract::{DefaultBodyLimit, State};
use axum::response::Json;
use axum::routing::{get, post};
use serde::Serialize;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use vista_pipeline::PipelineEngine;
use vista_plugins::{PluginInfo, PluginRegistry};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::rest;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Pipeline engine shared by every request and frame.
    pub engine: PipelineEngine,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Open WebSocket connections.
    pub connections: Arc<AtomicUsize>,
}

/// Body of `GET /plugins`.
#[derive(Debug, Serialize)]
pub struct PluginsResponse {
    /// Every plugin with its tools, sorted by id.
    pub plugins: Vec<PluginInfo>,
}

/// The Vista server.
pub struct VistaServer {
    state: AppState,
}

impl VistaServer {
    /// Create a server around `registry`.
    pub fn new(config: ServerConfig, registry: Arc<dyn PluginRegistry>) -> Self {
        Self::with_engine(config, PipelineEngine::new(registry))
    }

    /// Create a server around a preconfigured engine.
    pub fn with_engine(config: ServerConfig, engine: PipelineEngine) -> Self {
        Self {
            state: AppState {
                engine,
                config: Arc::new(config),
                shutdown: Arc::new(ShutdownCoordinator::new()),
                start_time: Instant::now(),
                connections: Arc::new(AtomicUsize::new(0)),
            },
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let body_limit = self.state.config.max_message_size;
        Router::new()
            .route(
                "/pipeline",
                post(rest::run_pipeline).layer(DefaultBodyLimit::max(body_limit)),
            )
            .route("/ws", get(websocket::ws_handler))
            .route("/health", get(health_handler))
            .route("/plugins", get(plugins_handler))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind and serve in a background task.
    ///
    /// Returns the bound address and the serve task, which ends once
    /// shutdown is initiated and open connections have closed.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = tokio::net::TcpListener::bind(self.state.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.state.shutdown.token();

        info!(%addr, plugins = self.state.engine.registry().plugin_ids().len(), "vista server listening");
        let handle = tokio::spawn(async move {
            let shutdown = async move { token.cancelled().await };
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!(error = %e, "server error");
            }
            info!("vista server stopped");
        });
        Ok((addr, handle))
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Open WebSocket connections.
    pub fn connection_count(&self) -> usize {
        self.state.connections.load(Ordering::Relaxed)
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.connections.load(Ordering::Relaxed);
    let plugins = state.engine.registry().plugin_ids().len();
    Json(health::health_check(
        state.start_time,
        connections,
        plugins,
        state.shutdown.is_shutting_down(),
    ))
}

/// GET /plugins
async fn plugins_handler(State(state): State<AppState>) -> Json<PluginsResponse> {
    Json(PluginsResponse {
        plugins: state.engine.registry().catalog(),
    })
}

//! HTTP transport server using Axum.
//!
//! Hosts the WebSocket upgrade route, a health check, and an optional
//! static-asset fallback. Upgraded sockets are handed to the hub.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
};
use serde_json::json;
use thiserror::Error;
use tokio::sync::mpsc;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::{info, warn};

use crate::connection::ConnectionConfig;
use crate::hub::ConnectionHub;

/// Transport server configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Port to listen on (0 for OS-assigned)
    pub port: u16,
    /// Hostname to bind to
    pub hostname: String,
    /// Maximum concurrent connections (`None` for unlimited)
    pub max_connections: Option<usize>,
    /// Directory served for every path that is not `/ws` or `/health`
    pub static_dir: Option<PathBuf>,
    /// Enable permissive CORS
    pub enable_cors: bool,
    /// Per-connection limits
    pub connection: ConnectionConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            hostname: "127.0.0.1".into(),
            max_connections: None,
            static_dir: None,
            enable_cors: false,
            connection: ConnectionConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid listen address {0}: {1}")]
    InvalidAddress(String, #[source] std::net::AddrParseError),

    #[error("failed to bind {0}: {1}")]
    Bind(SocketAddr, #[source] std::io::Error),
}

/// Shared state for the HTTP handlers.
struct AppState<H: ConnectionHub> {
    hub: Arc<H>,
    config: TransportConfig,
}

/// Build the transport's routes around `hub`.
pub fn router<H: ConnectionHub>(config: TransportConfig, hub: Arc<H>) -> Router {
    let static_dir = config.static_dir.clone();
    let enable_cors = config.enable_cors;

    let state = Arc::new(AppState { hub, config });

    let mut app = Router::new()
        .route("/ws", get(ws_upgrade_handler::<H>))
        .route("/health", get(health_handler::<H>))
        .with_state(state);

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }
    if enable_cors {
        app = app.layer(CorsLayer::permissive());
    }

    app
}

/// The running transport server.
pub struct TransportServer {
    /// Shutdown signal
    shutdown_tx: Option<mpsc::Sender<()>>,
    /// Server task handle
    handle: Option<tokio::task::JoinHandle<()>>,
    /// Actual bound address
    local_addr: SocketAddr,
}

impl TransportServer {
    /// Bind and start serving. Returns once the listener is bound.
    pub async fn start<H: ConnectionHub>(
        config: TransportConfig,
        hub: Arc<H>,
    ) -> Result<Self, TransportError> {
        let addr_str = format!("{}:{}", config.hostname, config.port);
        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| TransportError::InvalidAddress(addr_str.clone(), e))?;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::Bind(addr, e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| TransportError::Bind(addr, e))?;

        info!("Chatwire listening on ws://{local_addr}/ws");

        let app = router(config, hub);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await;
            if let Err(e) = served {
                warn!("Transport server exited with error: {e}");
            }
        });

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
            local_addr,
        })
    }

    /// Get the actual bound port.
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting requests and wait for the server task to finish.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!("Chatwire transport stopped");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn ws_upgrade_handler<H: ConnectionHub>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState<H>>>,
) -> Response {
    if let Some(max) = state.config.max_connections {
        let current = state.hub.connection_count();
        if current >= max {
            warn!("Connection rejected: max connections reached ({max})");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    }

    let config = state.config.connection;
    ws.max_message_size(config.max_frame_bytes)
        .max_frame_size(config.max_frame_bytes)
        .on_failed_upgrade(|e| warn!("WebSocket upgrade failed: {e}"))
        .on_upgrade(move |socket| async move {
            state.hub.accept_connection(socket, config);
        })
        .into_response()
}

async fn health_handler<H: ConnectionHub>(
    State(state): State<Arc<AppState<H>>>,
) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "connections": state.hub.connection_count(),
    }))
}

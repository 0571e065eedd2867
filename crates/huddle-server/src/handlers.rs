//! HTTP and WebSocket handlers for the Huddle server.
//!
//! The router exposes the WebSocket endpoint and a health check. Each
//! upgraded socket becomes an [`AxumConnection`] driven by
//! [`run_session`].

use crate::config::Config;
use crate::metrics;
use crate::session::{run_session, serve_transport, session_limiter};
use anyhow::Result;
use axum::{
    extract::{ws::WebSocketUpgrade, ConnectInfo, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use huddle_core::Relay;
use huddle_protocol::FrameCodec;
use huddle_transport::websocket::{WebSocketConfig, WebSocketTransport};
use huddle_transport::{AxumConnection, Transport};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// The discussion relay.
    pub relay: Arc<Relay>,
    /// Free session slots, shared by every endpoint.
    pub limiter: Arc<Semaphore>,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state with an empty discussion.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            relay: Arc::new(Relay::new()),
            limiter: session_limiter(config.limits.max_sessions),
            config,
        }
    }
}

/// Build the HTTP router.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route(&state.config.transport.websocket_path, get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone()));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let addr = config.bind_addr()?;

    if let Some(port) = config.transport.standalone_port {
        let transport = WebSocketTransport::new(WebSocketConfig {
            bind_addr: SocketAddr::new(addr.ip(), port),
            max_message_size: config.limits.max_message_size,
            ..Default::default()
        })
        .await?;
        let transport: Arc<dyn Transport> = Arc::new(transport);
        tokio::spawn(serve_transport(
            transport,
            Arc::clone(&state.relay),
            Arc::clone(&state.limiter),
        ));
    }

    let listener = TcpListener::bind(addr).await?;

    info!("Huddle server listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}",
        addr, config.transport.websocket_path
    );

    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.relay.stats().await;
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": stats.sessions,
        "messages": stats.messages,
    }))
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    peer: Option<ConnectInfo<SocketAddr>>,
    State(state): State<Arc<AppState>>,
) -> Response {
    // The slot is reserved before upgrading, so a burst cannot overshoot
    let Ok(permit) = Arc::clone(&state.limiter).try_acquire_owned() else {
        warn!(peer = ?peer.map(|p| p.0), "Session limit reached, refusing upgrade");
        metrics::record_rejected();
        return (StatusCode::SERVICE_UNAVAILABLE, "session limit reached").into_response();
    };

    let codec = FrameCodec::with_max_frame_size(state.config.limits.max_message_size);
    let relay = Arc::clone(&state.relay);

    ws.on_upgrade(move |socket| async move {
        let mut conn = AxumConnection::new(socket, codec);
        if let Some(ConnectInfo(addr)) = peer {
            debug!(peer = %addr, "WebSocket upgraded");
            conn = conn.with_remote_addr(addr);
        }
        run_session(relay, Box::new(conn)).await;
        drop(permit);
    })
}

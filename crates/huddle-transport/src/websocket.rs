//! Standalone WebSocket transport.
//!
//! This module provides a WebSocket listener using tokio-tungstenite, for
//! deployments that want a bare socket next to (or instead of) the HTTP
//! router.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use huddle_protocol::{ClientEvent, FrameCodec, ServerEvent};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message},
    WebSocketStream,
};
use tracing::{debug, info, warn};

use crate::traits::{Connection, Transport, TransportError};

/// Pause after a failed TCP accept, so a persistent error such as EMFILE
/// does not spin the listener.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Handshaken connections waiting for `accept`.
const ACCEPT_QUEUE: usize = 64;

/// WebSocket transport configuration.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum message size in bytes.
    pub max_message_size: usize,
    /// How long a peer may take to complete the upgrade request.
    pub handshake_timeout: Duration,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3001)),
            max_message_size: huddle_protocol::codec::MAX_FRAME_SIZE,
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

/// WebSocket transport.
///
/// A background task accepts TCP connections and runs each handshake in its
/// own task; `accept` hands out connections as their handshakes complete.
pub struct WebSocketTransport {
    incoming: Mutex<mpsc::Receiver<WebSocketConnection>>,
    local_addr: SocketAddr,
    acceptor: JoinHandle<()>,
}

impl WebSocketTransport {
    /// Create a new WebSocket transport.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn new(config: WebSocketConfig) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(TransportError::Io)?;
        let local_addr = listener.local_addr().map_err(TransportError::Io)?;

        info!("WebSocket transport listening on {}", local_addr);

        let (tx, rx) = mpsc::channel(ACCEPT_QUEUE);
        let acceptor = tokio::spawn(accept_loop(listener, config, tx));

        Ok(Self {
            incoming: Mutex::new(rx),
            local_addr,
            acceptor,
        })
    }

    /// Create a new WebSocket transport with default limits.
    ///
    /// # Errors
    ///
    /// Returns an error if binding fails.
    pub async fn bind(addr: SocketAddr) -> Result<Self, TransportError> {
        Self::new(WebSocketConfig {
            bind_addr: addr,
            ..Default::default()
        })
        .await
    }

    /// Get the local address this transport is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.acceptor.abort();
    }
}

async fn accept_loop(
    listener: TcpListener,
    config: WebSocketConfig,
    ready: mpsc::Sender<WebSocketConnection>,
) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "TCP accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };

        if ready.is_closed() {
            break;
        }

        debug!("Accepted TCP connection from {}", addr);
        tokio::spawn(handshake(stream, addr, config.clone(), ready.clone()));
    }
}

async fn handshake(
    stream: TcpStream,
    addr: SocketAddr,
    config: WebSocketConfig,
    ready: mpsc::Sender<WebSocketConnection>,
) {
    let ws_stream = match tokio::time::timeout(config.handshake_timeout, accept_async(stream)).await {
        Ok(Ok(ws_stream)) => ws_stream,
        Ok(Err(e)) => {
            warn!(peer = %addr, error = %e, "WebSocket handshake failed");
            return;
        }
        Err(_) => {
            warn!(peer = %addr, "WebSocket handshake timed out");
            return;
        }
    };

    debug!("WebSocket handshake completed with {}", addr);

    let codec = FrameCodec::with_max_frame_size(config.max_message_size);
    if ready
        .send(WebSocketConnection::new(ws_stream, addr, codec))
        .await
        .is_err()
    {
        debug!(peer = %addr, "Transport closed before accept");
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn accept(&self) -> Result<Box<dyn Connection>, TransportError> {
        let mut incoming = self.incoming.lock().await;
        match incoming.recv().await {
            Some(conn) => Ok(Box::new(conn)),
            None => Err(TransportError::ConnectionClosed),
        }
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}

/// A WebSocket connection.
pub struct WebSocketConnection {
    stream: WebSocketStream<TcpStream>,
    remote_addr: SocketAddr,
    is_open: bool,
    codec: FrameCodec,
}

impl WebSocketConnection {
    /// Create a new WebSocket connection.
    fn new(stream: WebSocketStream<TcpStream>, remote_addr: SocketAddr, codec: FrameCodec) -> Self {
        Self {
            stream,
            remote_addr,
            is_open: true,
            codec,
        }
    }
}

#[async_trait]
impl Connection for WebSocketConnection {
    async fn recv(&mut self) -> Result<Option<ClientEvent>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(self.codec.decode(&text)?));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(self.codec.decode_bytes(&data)?));
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
                    // tungstenite queues the pong reply itself
                }
                Some(Ok(Message::Close(_))) => {
                    debug!("Received close frame");
                    self.is_open = false;
                    return Ok(None);
                }
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {
                    debug!("Connection closed");
                    self.is_open = false;
                    return Ok(None);
                }
                Some(Err(e)) => {
                    warn!("WebSocket error: {}", e);
                    self.is_open = false;
                    return Err(TransportError::ReceiveFailed(e.to_string()));
                }
                None => {
                    debug!("WebSocket stream ended");
                    self.is_open = false;
                    return Ok(None);
                }
            }
        }
    }

    async fn send(&mut self, event: &ServerEvent) -> Result<(), TransportError> {
        if !self.is_open {
            return Err(TransportError::ConnectionClosed);
        }

        let text = self.codec.encode(event)?;
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !std::mem::replace(&mut self.is_open, false) {
            return Ok(()); // Already closed
        }

        self.stream
            .close(None)
            .await
            .map_err(|e| TransportError::SendFailed(format!("Failed to close: {}", e)))
    }

    fn remote_addr(&self) -> Option<String> {
        Some(self.remote_addr.to_string())
    }

    fn is_open(&self) -> bool {
        self.is_open
    }
}

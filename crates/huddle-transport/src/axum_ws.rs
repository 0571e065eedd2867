//! WebSocket connections upgraded by axum.
//!
//! The server mounts a route that calls `WebSocketUpgrade::on_upgrade` and
//! hands the resulting socket to [`AxumConnection::new`].

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use huddle_protocol::{ClientEvent, FrameCodec, ServerEvent};
use std::net::SocketAddr;
use tracing::{debug, warn};

use crate::traits::{Connection, TransportError};

/// A WebSocket connection accepted through an axum route.
pub struct AxumConnection {
    socket: WebSocket,
    codec: FrameCodec,
    remote_addr: Option<SocketAddr>,
    is_open: bool,
}

impl AxumConnection {
    /// Wrap an upgraded socket.
    #[must_use]
    pub fn new(socket: WebSocket, codec: FrameCodec) -> Self {
        Self {
            socket,
            codec,
            remote_addr: None,
            is_open: true,
        }
    }

    /// Record the peer address, when the router exposes it.
    #[must_use]
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }
}

#[async_trait]
impl Connection for AxumConnection {
    async fn recv(&mut self) -> Result<Option<ClientEvent>, TransportError> {
        loop {
            match self.socket.recv().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(self.codec.decode(&text)?));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(self.codec.decode_bytes(&data)?));
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    // axum answers pings itself
                }
                Some(Ok(Message::Close(_))) => {
                    debug!("Received close frame");
                    self.is_open = false;
                    return Ok(None);
                }
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket error");
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
        self.socket
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !std::mem::replace(&mut self.is_open, false) {
            return Ok(()); // Already closed
        }

        self.socket
            .send(Message::Close(None))
            .await
            .map_err(|e| TransportError::SendFailed(format!("Failed to close: {}", e)))
    }

    fn remote_addr(&self) -> Option<String> {
        self.remote_addr.map(|addr| addr.to_string())
    }

    fn is_open(&self) -> bool {
        self.is_open
    }
}

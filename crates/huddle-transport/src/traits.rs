//! Transport abstraction traits for Huddle.
//!
//! These traits define the interface that all transport implementations must provide,
//! allowing the session driver to be transport-agnostic.

use async_trait::async_trait;
use huddle_protocol::{ClientEvent, ProtocolError, ServerEvent};
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive data.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// The peer sent a frame that could not be decoded.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Whether the connection is still usable after this error.
    ///
    /// Only a bad frame is recoverable; everything else ends the session.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TransportError::Protocol(_))
    }
}

/// A transport that can accept connections.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Accept a new connection.
    ///
    /// This method waits until a new connection is available or an error occurs.
    async fn accept(&self) -> Result<Box<dyn Connection>, TransportError>;

    /// Get the transport name (e.g., "websocket", "memory").
    fn name(&self) -> &'static str;
}

/// An active connection over a transport.
///
/// Connections carry decoded events between the relay and a single client.
#[async_trait]
pub trait Connection: Send {
    /// Receive the next event from the connection.
    ///
    /// Returns `None` if the connection is closed cleanly. A
    /// `TransportError::Protocol` means one bad frame; the connection stays
    /// usable. Implementations must be cancel safe, since the session driver
    /// races this against outbound delivery.
    async fn recv(&mut self) -> Result<Option<ClientEvent>, TransportError>;

    /// Send an event to the connection.
    async fn send(&mut self, event: &ServerEvent) -> Result<(), TransportError>;

    /// Close the connection gracefully.
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Get the remote address of the connection, if available.
    fn remote_addr(&self) -> Option<String> {
        None
    }

    /// Check if the connection is still open.
    fn is_open(&self) -> bool;
}

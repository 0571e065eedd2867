//! In-memory transport.
//!
//! A connection and its client half joined by two unbounded channels of
//! JSON text. Frames still go through the codec, so tests exercise the same
//! decode path as a real socket.

use async_trait::async_trait;
use huddle_protocol::{codec, ClientEvent, FrameCodec, ProtocolError, ServerEvent};
use tokio::sync::mpsc;

use crate::traits::{Connection, TransportError};

/// Create a connected pair with the default frame limit.
#[must_use]
pub fn pair() -> (MemoryConnection, MemoryClient) {
    pair_with_codec(FrameCodec::new())
}

/// Create a connected pair with a specific codec.
#[must_use]
pub fn pair_with_codec(codec: FrameCodec) -> (MemoryConnection, MemoryClient) {
    let (to_server, from_client) = mpsc::unbounded_channel();
    let (to_client, from_server) = mpsc::unbounded_channel();

    let connection = MemoryConnection {
        inbound: from_client,
        outbound: Some(to_client),
        codec,
    };
    let client = MemoryClient {
        outbound: Some(to_server),
        inbound: from_server,
    };

    (connection, client)
}

/// Server half of an in-memory connection.
#[derive(Debug)]
pub struct MemoryConnection {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: Option<mpsc::UnboundedSender<String>>,
    codec: FrameCodec,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn recv(&mut self) -> Result<Option<ClientEvent>, TransportError> {
        match self.inbound.recv().await {
            Some(text) => Ok(Some(self.codec.decode(&text)?)),
            None => Ok(None),
        }
    }

    async fn send(&mut self, event: &ServerEvent) -> Result<(), TransportError> {
        let text = self.codec.encode(event)?;
        let outbound = self
            .outbound
            .as_ref()
            .ok_or(TransportError::ConnectionClosed)?;
        outbound
            .send(text)
            .map_err(|_| TransportError::ConnectionClosed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.outbound = None;
        self.inbound.close();
        Ok(())
    }

    fn remote_addr(&self) -> Option<String> {
        Some("memory".to_string())
    }

    fn is_open(&self) -> bool {
        self.outbound
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }
}

/// Client half of an in-memory connection.
#[derive(Debug)]
pub struct MemoryClient {
    outbound: Option<mpsc::UnboundedSender<String>>,
    inbound: mpsc::UnboundedReceiver<String>,
}

impl MemoryClient {
    /// Send an event to the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed.
    pub fn send(&self, event: &ClientEvent) -> Result<(), TransportError> {
        let text = codec::encode_client(event)?;
        self.send_text(text)
    }

    /// Send a raw text frame to the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed.
    pub fn send_text(&self, text: impl Into<String>) -> Result<(), TransportError> {
        let outbound = self
            .outbound
            .as_ref()
            .ok_or(TransportError::ConnectionClosed)?;
        outbound
            .send(text.into())
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Receive the next event from the server.
    ///
    /// Returns `None` once the server side is closed.
    ///
    /// # Errors
    ///
    /// Returns an error if the server sent something that is not a server event.
    pub async fn recv(&mut self) -> Result<Option<ServerEvent>, ProtocolError> {
        match self.inbound.recv().await {
            Some(text) => codec::decode_server(&text).map(Some),
            None => Ok(None),
        }
    }

    /// Receive an event if one is already queued.
    #[must_use]
    pub fn try_recv(&mut self) -> Option<ServerEvent> {
        self.inbound
            .try_recv()
            .ok()
            .and_then(|text| codec::decode_server(&text).ok())
    }

    /// Hang up; the server sees a clean close.
    pub fn close(&mut self) {
        self.outbound = None;
    }
}

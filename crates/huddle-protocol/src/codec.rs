//! Codec for encoding and decoding Huddle events.
//!
//! Each event is one JSON document in one WebSocket text frame, so there is
//! no length prefix and no partial-frame buffering.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::events::{codes, ClientEvent, ServerEvent};

/// Default maximum frame size (64 KiB).
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame exceeds maximum size.
    #[error("Frame size {size} exceeds maximum {max}")]
    FrameTooLarge {
        /// Actual frame size.
        size: usize,
        /// Configured limit.
        max: usize,
    },

    /// Invalid JSON, missing `type`, or missing required fields.
    #[error("Malformed event: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Well-formed event with a `type` this relay does not handle.
    #[error("Unknown event type: {0}")]
    UnknownType(String),

    /// JSON encoding error.
    #[error("Encoding error: {0}")]
    Encode(#[source] serde_json::Error),
}

impl ProtocolError {
    /// The `error` event to send back to the originator, if any.
    ///
    /// Unknown event types are dropped without a reply.
    #[must_use]
    pub fn reply(&self) -> Option<ServerEvent> {
        match self {
            ProtocolError::FrameTooLarge { .. } => {
                Some(ServerEvent::error(codes::FRAME_TOO_LARGE, self.to_string()))
            }
            ProtocolError::Malformed(_) => {
                Some(ServerEvent::error(codes::MALFORMED_EVENT, self.to_string()))
            }
            ProtocolError::UnknownType(_) | ProtocolError::Encode(_) => None,
        }
    }
}

/// Encode a server event to JSON text.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode(event: &ServerEvent) -> Result<String, ProtocolError> {
    serde_json::to_string(event).map_err(ProtocolError::Encode)
}

/// Decode a client event using the default size limit.
///
/// # Errors
///
/// Returns an error if the frame is too large, malformed, or of unknown type.
pub fn decode(text: &str) -> Result<ClientEvent, ProtocolError> {
    decode_limited(text, MAX_FRAME_SIZE)
}

/// Decode a client event, rejecting frames larger than `max` bytes.
///
/// # Errors
///
/// Returns an error if the frame is too large, malformed, or of unknown type.
pub fn decode_limited(text: &str, max: usize) -> Result<ClientEvent, ProtocolError> {
    decode_bytes(text.as_bytes(), max)
}

/// Decode a client event from raw frame bytes.
///
/// Binary frames are accepted as long as they hold UTF-8 JSON.
///
/// # Errors
///
/// Returns an error if the frame is too large, malformed, or of unknown type.
pub fn decode_bytes(data: &[u8], max: usize) -> Result<ClientEvent, ProtocolError> {
    if data.len() > max {
        return Err(ProtocolError::FrameTooLarge {
            size: data.len(),
            max,
        });
    }

    let value: Value = serde_json::from_slice(data)?;
    let event = ClientEvent::deserialize(&value)?;

    if event == ClientEvent::Unknown {
        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default();
        return Err(ProtocolError::UnknownType(tag.to_string()));
    }

    Ok(event)
}

/// Encode a client event, for client implementations and tests.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_client(event: &ClientEvent) -> Result<String, ProtocolError> {
    serde_json::to_string(event).map_err(ProtocolError::Encode)
}

/// Decode a server event, for client implementations and tests.
///
/// # Errors
///
/// Returns an error if the text is not a valid server event.
pub fn decode_server(text: &str) -> Result<ServerEvent, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

/// Codec carrying a configured frame size limit.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// Create a codec with the default limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_frame_size(MAX_FRAME_SIZE)
    }

    /// Create a codec with a custom limit.
    #[must_use]
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// The configured limit in bytes.
    #[must_use]
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Encode a server event.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn encode(&self, event: &ServerEvent) -> Result<String, ProtocolError> {
        encode(event)
    }

    /// Decode a client event.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding fails.
    pub fn decode(&self, text: &str) -> Result<ClientEvent, ProtocolError> {
        decode_limited(text, self.max_frame_size)
    }

    /// Decode a client event from raw frame bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding fails.
    pub fn decode_bytes(&self, data: &[u8]) -> Result<ClientEvent, ProtocolError> {
        decode_bytes(data, self.max_frame_size)
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

//! Event types for the Huddle protocol.
//!
//! Events are JSON objects discriminated by their `type` field. Inbound and
//! outbound events are separate closed enums so each side only handles the
//! shapes it can actually receive.

use crate::message::{Message, MessageDraft, MessageEdit, MessageId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error codes carried by `ServerEvent::Error`.
pub mod codes {
    /// The event was not valid JSON or lacked required fields.
    pub const MALFORMED_EVENT: u16 = 4000;
    /// The frame exceeded the configured size limit.
    pub const FRAME_TOO_LARGE: u16 = 4013;
}

/// An event sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Create a new message.
    #[serde(rename = "message")]
    Message {
        /// Message payload; the server assigns the id.
        data: MessageDraft,
        /// Opaque token echoed back on the resulting broadcast.
        #[serde(
            rename = "correlationToken",
            alias = "tempId",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        correlation_token: Option<Value>,
    },

    /// Delete a message.
    #[serde(rename = "delete")]
    Delete {
        /// Target message.
        #[serde(rename = "messageId")]
        message_id: MessageId,
    },

    /// Pin a message.
    #[serde(rename = "pin")]
    Pin {
        /// Target message.
        #[serde(rename = "messageId")]
        message_id: MessageId,
    },

    /// Replace a message's content.
    #[serde(rename = "update")]
    Update {
        /// Target and replacement content.
        data: MessageEdit,
    },

    /// Typing indicator.
    #[serde(rename = "typing")]
    Typing {
        /// Who is typing.
        user: String,
    },

    /// Ask the assistant a question.
    #[serde(rename = "askAI")]
    AskAi {
        /// The question.
        prompt: String,
        /// Who asked.
        user: String,
    },

    /// Any `type` this relay does not recognize.
    #[serde(other)]
    Unknown,
}

impl ClientEvent {
    /// Get the event kind, as used for logging and metrics labels.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ClientEvent::Message { .. } => "message",
            ClientEvent::Delete { .. } => "delete",
            ClientEvent::Pin { .. } => "pin",
            ClientEvent::Update { .. } => "update",
            ClientEvent::Typing { .. } => "typing",
            ClientEvent::AskAi { .. } => "askAI",
            ClientEvent::Unknown => "unknown",
        }
    }

    /// Create a `message` event.
    #[must_use]
    pub fn message(data: MessageDraft, correlation_token: Option<Value>) -> Self {
        ClientEvent::Message {
            data,
            correlation_token,
        }
    }

    /// Create a `delete` event.
    #[must_use]
    pub fn delete(message_id: impl Into<MessageId>) -> Self {
        ClientEvent::Delete {
            message_id: message_id.into(),
        }
    }

    /// Create a `pin` event.
    #[must_use]
    pub fn pin(message_id: impl Into<MessageId>) -> Self {
        ClientEvent::Pin {
            message_id: message_id.into(),
        }
    }

    /// Create an `update` event.
    #[must_use]
    pub fn update(id: impl Into<MessageId>, content: impl Into<String>) -> Self {
        ClientEvent::Update {
            data: MessageEdit {
                id: id.into(),
                content: content.into(),
            },
        }
    }

    /// Create a `typing` event.
    #[must_use]
    pub fn typing(user: impl Into<String>) -> Self {
        ClientEvent::Typing { user: user.into() }
    }

    /// Create an `askAI` event.
    #[must_use]
    pub fn ask_ai(prompt: impl Into<String>, user: impl Into<String>) -> Self {
        ClientEvent::AskAi {
            prompt: prompt.into(),
            user: user.into(),
        }
    }
}

/// An event sent by the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Full discussion state, sent once when a session connects.
    #[serde(rename = "snapshot")]
    Snapshot {
        /// Messages in insertion order.
        data: Vec<Message>,
    },

    /// A message was created.
    #[serde(rename = "message")]
    Message {
        /// The stored message.
        data: Message,
        /// Token from the originating `message` event.
        #[serde(
            rename = "correlationToken",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        correlation_token: Option<Value>,
    },

    /// A message was deleted (or was already absent).
    #[serde(rename = "delete")]
    Delete {
        /// The deleted id.
        id: MessageId,
    },

    /// A message was pinned.
    #[serde(rename = "pin")]
    Pin {
        /// The pinned message.
        message: Message,
    },

    /// A message was edited.
    #[serde(rename = "update")]
    Update {
        /// The edited message.
        data: Message,
    },

    /// Someone else is typing.
    #[serde(rename = "typing")]
    Typing {
        /// Who is typing.
        user: String,
    },

    /// Answer to an `askAI` event.
    #[serde(rename = "aiResponse")]
    AiResponse {
        /// The answer text.
        response: String,
    },

    /// The originating event was rejected.
    #[serde(rename = "error")]
    Error {
        /// See [`codes`].
        code: u16,
        /// Human-readable reason.
        message: String,
    },
}

impl ServerEvent {
    /// Get the event kind, as used for logging and metrics labels.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::Snapshot { .. } => "snapshot",
            ServerEvent::Message { .. } => "message",
            ServerEvent::Delete { .. } => "delete",
            ServerEvent::Pin { .. } => "pin",
            ServerEvent::Update { .. } => "update",
            ServerEvent::Typing { .. } => "typing",
            ServerEvent::AiResponse { .. } => "aiResponse",
            ServerEvent::Error { .. } => "error",
        }
    }

    /// Create a `snapshot` event.
    #[must_use]
    pub fn snapshot(data: Vec<Message>) -> Self {
        ServerEvent::Snapshot { data }
    }

    /// Create an `error` event.
    #[must_use]
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        ServerEvent::Error {
            code,
            message: message.into(),
        }
    }
}

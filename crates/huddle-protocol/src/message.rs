//! Discussion message types.
//!
//! A message is a small fixed core (`id`, `content`, `pinned`) plus whatever
//! extra fields the client attached, which are carried through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A server-assigned message identifier.
pub type MessageId = String;

/// A stored discussion message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Server-assigned unique identifier.
    pub id: MessageId,
    /// Message body.
    #[serde(default)]
    pub content: String,
    /// Whether the message has been pinned.
    #[serde(default)]
    pub pinned: bool,
    /// Opaque client fields, flattened into the message object.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    /// Create a message with no extra fields.
    #[must_use]
    pub fn new(id: impl Into<MessageId>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            pinned: false,
            extra: Map::new(),
        }
    }
}

/// The payload of a `message` event, before the server assigns an id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageDraft {
    /// Message body.
    #[serde(default)]
    pub content: String,
    /// Initial pinned flag.
    #[serde(default)]
    pub pinned: bool,
    /// Everything else the client sent.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessageDraft {
    /// Create a draft with just a body.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// Attach an extra pass-through field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Turn the draft into a stored message under `id`.
    ///
    /// Any `id` the client put in the payload is discarded.
    #[must_use]
    pub fn into_message(mut self, id: impl Into<MessageId>) -> Message {
        self.extra.remove("id");
        Message {
            id: id.into(),
            content: self.content,
            pinned: self.pinned,
            extra: self.extra,
        }
    }
}

/// The payload of an `update` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEdit {
    /// Target message.
    pub id: MessageId,
    /// Replacement body.
    pub content: String,
}

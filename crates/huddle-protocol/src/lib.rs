//! # huddle-protocol
//!
//! Wire protocol definitions for the Huddle discussion relay.
//!
//! Every event is a JSON object carrying a `type` discriminant and travels
//! as a single WebSocket text frame.
//!
//! ## Event Types
//!
//! - `ClientEvent` - what a client may send (`message`, `delete`, `pin`,
//!   `update`, `typing`, `askAI`)
//! - `ServerEvent` - what the relay fans out (`snapshot`, `message`,
//!   `delete`, `pin`, `update`, `typing`, `aiResponse`, `error`)
//! - `Message` - a stored discussion message
//!
//! ## Example
//!
//! ```rust
//! use huddle_protocol::{codec, ClientEvent};
//!
//! let event = codec::decode(r#"{"type":"pin","messageId":"42"}"#).unwrap();
//! assert_eq!(event, ClientEvent::Pin { message_id: "42".into() });
//! ```

pub mod codec;
pub mod events;
pub mod message;

pub use codec::{decode, encode, FrameCodec, ProtocolError};
pub use events::{codes, ClientEvent, ServerEvent};
pub use message::{Message, MessageDraft, MessageEdit, MessageId};

//! # huddle-transport
//!
//! Transport abstraction layer for the Huddle discussion relay.
//!
//! The relay itself never touches sockets. It needs a way to accept
//! sessions, read one decoded event at a time, and write events back.
//! This crate provides that seam and its implementations:
//!
//! - **axum** - WebSocket upgraded from an axum HTTP route
//! - **WebSocket** - Standalone tokio-tungstenite listener
//! - **Memory** - In-process channel pair, used by tests
//!
//! ```rust,ignore
//! use huddle_transport::Connection;
//!
//! async fn handle_connection(mut conn: Box<dyn Connection>) {
//!     while let Ok(Some(event)) = conn.recv().await {
//!         // Dispatch event
//!     }
//! }
//! ```

pub mod axum_ws;
pub mod memory;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use axum_ws::AxumConnection;
pub use memory::{MemoryClient, MemoryConnection};
pub use traits::{Connection, Transport, TransportError};

#[cfg(feature = "websocket")]
pub use websocket::WebSocketTransport;

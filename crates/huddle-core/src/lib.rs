//! # huddle-core
//!
//! Core state and event dispatch for the Huddle discussion relay.
//!
//! This crate provides the building blocks behind every connection:
//!
//! - **DiscussionStore** - Insertion-ordered list of messages
//! - **BroadcastHub** - Registered sessions and fan-out
//! - **Relay** - Serialized dispatch of client events into the store and hub
//! - **IdGenerator** - Server-assigned message identifiers
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────────┐
//! │   Session   │────▶│    Relay    │────▶│ DiscussionStore │
//! └─────────────┘     └─────────────┘     └─────────────────┘
//!        ▲                   │
//!        │                   ▼
//!        │            ┌─────────────┐
//!        └────────────│BroadcastHub │
//!                     └─────────────┘
//! ```

pub mod assistant;
pub mod hub;
pub mod id;
pub mod relay;
pub mod store;

pub use hub::{BroadcastHub, SessionId, SessionReceiver};
pub use id::IdGenerator;
pub use relay::{Dispatch, Relay, RelayStats, Session};
pub use store::{DiscussionStore, StoreError};

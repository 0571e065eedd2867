//! Broadcast hub for Huddle.
//!
//! The hub owns the set of connected sessions. Each session has its own
//! unbounded outbound queue; fan-out is a synchronous push onto every
//! matching queue, so a broadcast never waits on a slow socket.

use dashmap::DashMap;
use huddle_protocol::{Message, ServerEvent};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Receiving half of a session's outbound queue.
pub type SessionReceiver = mpsc::UnboundedReceiver<Arc<ServerEvent>>;

type SessionSender = mpsc::UnboundedSender<Arc<ServerEvent>>;

/// Identifier of one connected client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Create a session ID from a raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw value.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sess_{}", self.0)
    }
}

/// Registered sessions and fan-out.
#[derive(Debug, Default)]
pub struct BroadcastHub {
    /// Outbound queues indexed by session.
    sessions: DashMap<SessionId, SessionSender>,
    /// Next session number.
    next_id: AtomicU64,
}

impl BroadcastHub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh session ID.
    #[must_use]
    pub fn next_session_id(&self) -> SessionId {
        SessionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Register a session.
    ///
    /// The snapshot is queued before the session becomes visible to any
    /// broadcast, so it is always the first event the session receives.
    pub fn register(&self, session: SessionId, snapshot: Vec<Message>) -> SessionReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is alive, so this cannot fail.
        let _ = tx.send(Arc::new(ServerEvent::snapshot(snapshot)));

        if self.sessions.insert(session, tx).is_some() {
            debug!(session = %session, "Replaced existing session queue");
        }
        debug!(session = %session, sessions = self.sessions.len(), "Registered");

        rx
    }

    /// Remove a session.
    ///
    /// Returns `true` if the session was registered.
    pub fn unregister(&self, session: &SessionId) -> bool {
        let removed = self.sessions.remove(session).is_some();
        if removed {
            debug!(session = %session, sessions = self.sessions.len(), "Unregistered");
        }
        removed
    }

    /// Check if a session is registered.
    #[must_use]
    pub fn is_registered(&self, session: &SessionId) -> bool {
        self.sessions.contains_key(session)
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Deliver an event to every session, the originator included.
    ///
    /// Returns the number of sessions that received it.
    pub fn broadcast_all(&self, event: ServerEvent) -> usize {
        self.fan_out(None, event)
    }

    /// Deliver an event to every session except `origin`.
    ///
    /// Returns the number of sessions that received it.
    pub fn broadcast_others(&self, origin: &SessionId, event: ServerEvent) -> usize {
        self.fan_out(Some(origin), event)
    }

    /// Deliver an event to a single session.
    ///
    /// Returns `false` if the session is gone.
    pub fn send_to(&self, session: &SessionId, event: ServerEvent) -> bool {
        let delivered = self
            .sessions
            .get(session)
            .is_some_and(|tx| tx.send(Arc::new(event)).is_ok());
        if !delivered {
            trace!(session = %session, "Dropped event for departed session");
        }
        delivered
    }

    fn fan_out(&self, skip: Option<&SessionId>, event: ServerEvent) -> usize {
        let kind = event.kind();
        let event = Arc::new(event);
        let mut delivered = 0;
        let mut gone = Vec::new();

        for entry in self.sessions.iter() {
            if Some(entry.key()) == skip {
                continue;
            }
            if entry.value().send(Arc::clone(&event)).is_ok() {
                delivered += 1;
            } else {
                gone.push(*entry.key());
            }
        }

        // Receivers dropped without unregistering; forget them.
        for session in gone {
            trace!(session = %session, "Pruned departed session");
            self.sessions.remove(&session);
        }

        trace!(event = kind, recipients = delivered, "Broadcast");
        delivered
    }
}

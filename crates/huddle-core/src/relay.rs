//! Event dispatch for Huddle.
//!
//! The relay owns the discussion store and the broadcast hub. Each inbound
//! event runs to completion under the store lock, including its fan-out, so
//! every session observes mutations in the same order.

use crate::assistant::placeholder_response;
use crate::hub::{BroadcastHub, SessionId, SessionReceiver};
use crate::store::DiscussionStore;
use huddle_protocol::{ClientEvent, ServerEvent};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A connected session as handed to the transport layer.
#[derive(Debug)]
pub struct Session {
    /// The session's identifier.
    pub id: SessionId,
    /// Outbound events, starting with the snapshot.
    pub events: SessionReceiver,
}

/// Outcome of dispatching one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The resulting event reached this many sessions.
    Delivered(usize),
    /// The target message does not exist; nothing was sent.
    Skipped,
    /// The event type is not handled; nothing was sent.
    Ignored,
}

/// Relay statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    /// Number of registered sessions.
    pub sessions: usize,
    /// Number of stored messages.
    pub messages: usize,
}

/// The event dispatcher.
#[derive(Debug, Default)]
pub struct Relay {
    store: Mutex<DiscussionStore>,
    hub: BroadcastHub,
}

impl Relay {
    /// Create a relay with an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a relay around an existing store.
    #[must_use]
    pub fn with_store(store: DiscussionStore) -> Self {
        Self {
            store: Mutex::new(store),
            hub: BroadcastHub::new(),
        }
    }

    /// Get the broadcast hub.
    #[must_use]
    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    /// Get relay statistics.
    pub async fn stats(&self) -> RelayStats {
        let store = self.store.lock().await;
        RelayStats {
            sessions: self.hub.session_count(),
            messages: store.len(),
        }
    }

    /// Register a new session.
    ///
    /// The snapshot is taken under the store lock, so the session sees
    /// exactly the events dispatched after it.
    pub async fn connect(&self) -> Session {
        let store = self.store.lock().await;
        let id = self.hub.next_session_id();
        let events = self.hub.register(id, store.snapshot());

        info!(session = %id, messages = store.len(), "Session connected");

        Session { id, events }
    }

    /// Unregister a session. Safe to call more than once.
    pub fn disconnect(&self, session: &SessionId) {
        if self.hub.unregister(session) {
            info!(session = %session, "Session disconnected");
        }
    }

    /// Send an event to one session only.
    ///
    /// Returns `false` if the session is gone.
    pub fn reply(&self, session: &SessionId, event: ServerEvent) -> bool {
        self.hub.send_to(session, event)
    }

    /// Apply one client event and fan out the result.
    pub async fn dispatch(&self, origin: &SessionId, event: ClientEvent) -> Dispatch {
        let kind = event.kind();
        let mut store = self.store.lock().await;

        let outcome = match event {
            ClientEvent::Message {
                data,
                correlation_token,
            } => {
                let created = store.create(data);
                Dispatch::Delivered(self.hub.broadcast_all(ServerEvent::Message {
                    data: created,
                    correlation_token,
                }))
            }

            ClientEvent::Delete { message_id } => {
                if store.delete(&message_id).is_none() {
                    debug!(session = %origin, id = %message_id, "Delete of absent message");
                }
                Dispatch::Delivered(self.hub.broadcast_all(ServerEvent::Delete { id: message_id }))
            }

            ClientEvent::Pin { message_id } => match store.pin(&message_id) {
                Ok(message) => Dispatch::Delivered(self.hub.broadcast_all(ServerEvent::Pin { message })),
                Err(e) => {
                    debug!(session = %origin, error = %e, "Pin skipped");
                    Dispatch::Skipped
                }
            },

            ClientEvent::Update { data } => match store.update(&data.id, data.content) {
                Ok(message) => {
                    Dispatch::Delivered(self.hub.broadcast_all(ServerEvent::Update { data: message }))
                }
                Err(e) => {
                    debug!(session = %origin, error = %e, "Update skipped");
                    Dispatch::Skipped
                }
            },

            ClientEvent::Typing { user } => {
                Dispatch::Delivered(self.hub.broadcast_others(origin, ServerEvent::Typing { user }))
            }

            ClientEvent::AskAi { prompt, user } => {
                let response = placeholder_response(&prompt, &user);
                Dispatch::Delivered(self.hub.broadcast_all(ServerEvent::AiResponse { response }))
            }

            ClientEvent::Unknown => {
                warn!(session = %origin, "Ignoring event of unknown type");
                Dispatch::Ignored
            }
        };

        debug!(session = %origin, event = kind, outcome = ?outcome, "Dispatched");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_protocol::{Message, MessageDraft, MessageId};
    use serde_json::json;
    use std::sync::Arc;

    async fn drain_snapshot(session: &mut Session) -> Vec<Message> {
        match session.events.recv().await.as_deref() {
            Some(ServerEvent::Snapshot { data }) => data.clone(),
            other => panic!("Expected snapshot, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_then_delete_scenario() {
        let relay = Relay::new();
        let mut a = relay.connect().await;
        let mut b = relay.connect().await;
        assert!(drain_snapshot(&mut a).await.is_empty());
        assert!(drain_snapshot(&mut b).await.is_empty());

        let outcome = relay
            .dispatch(
                &a.id,
                ClientEvent::message(MessageDraft::new("hi"), Some(json!("t1"))),
            )
            .await;
        assert_eq!(outcome, Dispatch::Delivered(2));

        let created = match a.events.recv().await.as_deref() {
            Some(ServerEvent::Message {
                data,
                correlation_token,
            }) => {
                assert_eq!(data.content, "hi");
                assert_eq!(correlation_token, &Some(json!("t1")));
                data.clone()
            }
            other => panic!("Expected message, got {:?}", other),
        };
        let seen_by_b = b.events.recv().await.unwrap();
        assert!(matches!(&*seen_by_b, ServerEvent::Message { data, .. } if *data == created));

        relay
            .dispatch(&b.id, ClientEvent::delete(created.id.clone()))
            .await;
        for session in [&mut a, &mut b] {
            assert_eq!(
                *session.events.recv().await.unwrap(),
                ServerEvent::Delete {
                    id: created.id.clone()
                }
            );
        }
        assert_eq!(relay.stats().await.messages, 0);
    }

    #[tokio::test]
    async fn test_delete_absent_still_broadcasts() {
        let relay = Relay::new();
        let mut a = relay.connect().await;
        drain_snapshot(&mut a).await;

        let outcome = relay.dispatch(&a.id, ClientEvent::delete("nope")).await;
        assert_eq!(outcome, Dispatch::Delivered(1));
        assert_eq!(
            *a.events.recv().await.unwrap(),
            ServerEvent::Delete { id: "nope".into() }
        );
    }

    #[tokio::test]
    async fn test_pin_and_update_after_delete_are_skipped() {
        let relay = Relay::new();
        let mut a = relay.connect().await;
        drain_snapshot(&mut a).await;

        relay
            .dispatch(&a.id, ClientEvent::message(MessageDraft::new("x"), None))
            .await;
        let id = match a.events.recv().await.as_deref() {
            Some(ServerEvent::Message { data, .. }) => data.id.clone(),
            other => panic!("Expected message, got {:?}", other),
        };
        relay.dispatch(&a.id, ClientEvent::delete(id.clone())).await;
        a.events.recv().await.unwrap();

        assert_eq!(
            relay.dispatch(&a.id, ClientEvent::pin(id.clone())).await,
            Dispatch::Skipped
        );
        assert_eq!(
            relay.dispatch(&a.id, ClientEvent::update(id, "late")).await,
            Dispatch::Skipped
        );
        assert!(a.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_pin_is_idempotent_and_rebroadcasts() {
        let mut store = DiscussionStore::new();
        let message = store.create(MessageDraft::new("keep"));
        let relay = Relay::with_store(store);
        let mut a = relay.connect().await;
        drain_snapshot(&mut a).await;

        for _ in 0..2 {
            assert_eq!(
                relay.dispatch(&a.id, ClientEvent::pin(message.id.clone())).await,
                Dispatch::Delivered(1)
            );
            match a.events.recv().await.as_deref() {
                Some(ServerEvent::Pin { message: pinned }) => {
                    assert!(pinned.pinned);
                    assert_eq!(pinned.id, message.id);
                }
                other => panic!("Expected pin, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_update_broadcasts_edited_message() {
        let mut store = DiscussionStore::new();
        let message = store.create(MessageDraft::new("draft"));
        let relay = Relay::with_store(store);
        let mut a = relay.connect().await;
        drain_snapshot(&mut a).await;

        relay
            .dispatch(&a.id, ClientEvent::update(message.id.clone(), "final"))
            .await;
        match a.events.recv().await.as_deref() {
            Some(ServerEvent::Update { data }) => {
                assert_eq!(data.id, message.id);
                assert_eq!(data.content, "final");
            }
            other => panic!("Expected update, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_typing_skips_originator() {
        let relay = Relay::new();
        let mut a = relay.connect().await;
        let mut b = relay.connect().await;
        let mut c = relay.connect().await;
        drain_snapshot(&mut a).await;
        drain_snapshot(&mut b).await;
        drain_snapshot(&mut c).await;

        let outcome = relay.dispatch(&a.id, ClientEvent::typing("ada")).await;
        assert_eq!(outcome, Dispatch::Delivered(2));

        let expected = ServerEvent::Typing { user: "ada".into() };
        assert_eq!(*b.events.recv().await.unwrap(), expected);
        assert_eq!(*c.events.recv().await.unwrap(), expected);
        assert!(a.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_ask_ai_broadcasts_placeholder() {
        let relay = Relay::new();
        let mut a = relay.connect().await;
        drain_snapshot(&mut a).await;

        relay
            .dispatch(&a.id, ClientEvent::ask_ai("why?", "ada"))
            .await;
        assert_eq!(
            *a.events.recv().await.unwrap(),
            ServerEvent::AiResponse {
                response: "AI Response to \"why?\" from ada".into()
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_is_ignored() {
        let relay = Relay::new();
        let mut a = relay.connect().await;
        drain_snapshot(&mut a).await;

        assert_eq!(
            relay.dispatch(&a.id, ClientEvent::Unknown).await,
            Dispatch::Ignored
        );
        assert!(a.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_late_session_snapshot_matches_creation_order() {
        let relay = Relay::new();
        let writer = relay.connect().await;

        let mut created = Vec::new();
        for i in 0..5 {
            relay
                .dispatch(
                    &writer.id,
                    ClientEvent::message(MessageDraft::new(format!("m{i}")), None),
                )
                .await;
            created.push(format!("m{i}"));
        }

        let mut late = relay.connect().await;
        let snapshot = drain_snapshot(&mut late).await;
        let contents: Vec<_> = snapshot.into_iter().map(|m| m.content).collect();
        assert_eq!(contents, created);

        relay.dispatch(&writer.id, ClientEvent::typing("w")).await;
        assert!(matches!(
            late.events.recv().await.as_deref(),
            Some(ServerEvent::Typing { .. })
        ));
    }

    #[tokio::test]
    async fn test_disconnect_stops_delivery() {
        let relay = Relay::new();
        let a = relay.connect().await;
        let mut b = relay.connect().await;
        drain_snapshot(&mut b).await;

        relay.disconnect(&b.id);
        relay.disconnect(&b.id);

        let outcome = relay.dispatch(&a.id, ClientEvent::ask_ai("q", "u")).await;
        assert_eq!(outcome, Dispatch::Delivered(1));
        assert!(b.events.recv().await.is_none());
        assert_eq!(relay.stats().await.sessions, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_dispatch_is_serialized() {
        let mut store = DiscussionStore::new();
        let seeded: Vec<Message> = (0..20)
            .map(|i| store.create(MessageDraft::new(format!("seed {i}"))))
            .collect();
        let relay = Arc::new(Relay::with_store(store));

        let mut sessions = Vec::new();
        for _ in 0..4 {
            let mut session = relay.connect().await;
            assert_eq!(drain_snapshot(&mut session).await, seeded);
            sessions.push(session);
        }

        // Every writer hits the same seeded ids with pins and deletes
        let ids: Vec<MessageId> = seeded.iter().map(|m| m.id.clone()).collect();
        let writers: Vec<_> = sessions
            .iter()
            .enumerate()
            .map(|(w, session)| {
                let relay = Arc::clone(&relay);
                let origin = session.id;
                let ids = ids.clone();
                tokio::spawn(async move {
                    for round in 0..60 {
                        let target = ids[(w * 7 + round) % ids.len()].clone();
                        let event = match round % 3 {
                            0 => ClientEvent::message(
                                MessageDraft::new(format!("w{w} r{round}")),
                                None,
                            ),
                            1 => ClientEvent::pin(target),
                            _ => ClientEvent::delete(target),
                        };
                        relay.dispatch(&origin, event).await;
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap();
        }

        let logs: Vec<Vec<ServerEvent>> = sessions
            .iter_mut()
            .map(|session| {
                let mut log = Vec::new();
                while let Ok(event) = session.events.try_recv() {
                    log.push((*event).clone());
                }
                log
            })
            .collect();
        assert!(!logs[0].is_empty());
        for log in &logs[1..] {
            assert_eq!(log, &logs[0]);
        }

        // Replaying the shared log over the seed reproduces the final store
        let mut expected = seeded.clone();
        for event in &logs[0] {
            match event {
                ServerEvent::Message { data, .. } => expected.push(data.clone()),
                ServerEvent::Delete { id } => expected.retain(|m| &m.id != id),
                ServerEvent::Pin { message } => {
                    let stored = expected
                        .iter_mut()
                        .find(|m| m.id == message.id)
                        .expect("pin broadcast for a deleted message");
                    stored.pinned = true;
                    assert_eq!(*stored, *message);
                }
                other => panic!("Unexpected event {:?}", other),
            }
        }

        let mut late = relay.connect().await;
        let snapshot = drain_snapshot(&mut late).await;
        assert_eq!(snapshot, expected);
        assert_eq!(relay.stats().await.messages, snapshot.len());
    }
}

//! The discussion store.
//!
//! An insertion-ordered list of messages. It has no locking of its own; the
//! [`Relay`](crate::Relay) owns it behind a mutex so every mutation and the
//! broadcast that follows it happen as one step.

use crate::id::IdGenerator;
use huddle_protocol::{Message, MessageDraft, MessageId};
use thiserror::Error;
use tracing::trace;

/// Store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No message with this id.
    #[error("Message not found: {0}")]
    NotFound(MessageId),
}

/// In-memory, insertion-ordered discussion.
#[derive(Debug, Default)]
pub struct DiscussionStore {
    messages: Vec<Message>,
    ids: IdGenerator,
}

impl DiscussionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current messages, in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Store a new message under a fresh server-assigned id.
    pub fn create(&mut self, draft: MessageDraft) -> Message {
        let message = draft.into_message(self.ids.next_id());
        trace!(id = %message.id, "Created message");
        self.messages.push(message.clone());
        message
    }

    /// Remove a message. Absent ids are a no-op.
    pub fn delete(&mut self, id: &str) -> Option<Message> {
        let index = self.position(id)?;
        trace!(id = %id, "Deleted message");
        Some(self.messages.remove(index))
    }

    /// Mark a message as pinned. Pinning twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no message has this id.
    pub fn pin(&mut self, id: &str) -> Result<Message, StoreError> {
        let message = self.get_mut(id)?;
        message.pinned = true;
        Ok(message.clone())
    }

    /// Replace a message's content in place.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no message has this id.
    pub fn update(&mut self, id: &str, content: impl Into<String>) -> Result<Message, StoreError> {
        let message = self.get_mut(id)?;
        message.content = content.into();
        Ok(message.clone())
    }

    /// Look up a message.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Number of stored messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.messages.iter().position(|m| m.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Message, StoreError> {
        self.messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_create_appends_in_order() {
        let mut store = DiscussionStore::new();
        let a = store.create(MessageDraft::new("a"));
        let b = store.create(MessageDraft::new("b"));

        let snapshot = store.snapshot();
        assert_eq!(snapshot, vec![a, b]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_create_assigns_distinct_ids() {
        let mut store = DiscussionStore::new();
        let ids: HashSet<_> = (0..500)
            .map(|i| store.create(MessageDraft::new(i.to_string())).id)
            .collect();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn test_create_keeps_extra_fields() {
        let mut store = DiscussionStore::new();
        let created = store.create(
            MessageDraft::new("hi")
                .with_field("id", json!("client-chosen"))
                .with_field("author", json!("ada")),
        );

        assert_ne!(created.id, "client-chosen");
        assert_eq!(created.extra.get("author"), Some(&json!("ada")));
        assert!(!created.extra.contains_key("id"));
    }

    #[test]
    fn test_delete() {
        let mut store = DiscussionStore::new();
        let a = store.create(MessageDraft::new("a"));
        let b = store.create(MessageDraft::new("b"));

        assert_eq!(store.delete(&a.id), Some(a.clone()));
        assert_eq!(store.snapshot(), vec![b]);

        // Deleting again is a no-op
        assert_eq!(store.delete(&a.id), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_pin_in_place_and_idempotent() {
        let mut store = DiscussionStore::new();
        let a = store.create(MessageDraft::new("a"));
        let b = store.create(MessageDraft::new("b"));

        let pinned = store.pin(&a.id).unwrap();
        assert!(pinned.pinned);
        assert_eq!(store.pin(&a.id).unwrap(), pinned);

        let snapshot = store.snapshot();
        assert_eq!(snapshot[0], pinned);
        assert_eq!(snapshot[1], b);
    }

    #[test]
    fn test_update_in_place() {
        let mut store = DiscussionStore::new();
        let a = store.create(MessageDraft::new("a"));
        let _b = store.create(MessageDraft::new("b"));

        let updated = store.update(&a.id, "edited").unwrap();
        assert_eq!(updated.id, a.id);
        assert_eq!(updated.content, "edited");
        assert_eq!(store.snapshot()[0], updated);
    }

    #[test]
    fn test_missing_targets() {
        let mut store = DiscussionStore::new();
        let a = store.create(MessageDraft::new("a"));
        store.delete(&a.id);

        assert_eq!(store.pin(&a.id), Err(StoreError::NotFound(a.id.clone())));
        assert_eq!(
            store.update(&a.id, "late"),
            Err(StoreError::NotFound(a.id.clone()))
        );
        assert!(store.is_empty());
    }
}

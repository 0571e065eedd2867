//! Message identifier generation.

use huddle_protocol::MessageId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Generates unique message identifiers.
///
/// An id is `<unix millis>-<sequence>`. The sequence never repeats for a
/// given generator, so two ids minted in the same millisecond still differ.
#[derive(Debug, Default)]
pub struct IdGenerator {
    sequence: AtomicU64,
}

impl IdGenerator {
    /// Create a new generator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate the next identifier.
    #[must_use]
    pub fn next_id(&self) -> MessageId {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{millis}-{seq}")
    }

    /// Number of identifiers issued so far.
    #[must_use]
    pub fn issued(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

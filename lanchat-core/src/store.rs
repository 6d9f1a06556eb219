//! Append-only message store with per-peer and per-conversation queries.
//!
//! Written by the receive loop and the send path, read by the caller. Same
//! locking discipline as the peer table: one mutex, held per operation.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::message::Message;

/// In-memory record of every sent and received message, in insertion order.
/// No deduplication by id; idempotence is the caller's problem.
#[derive(Debug, Default)]
pub struct ConversationStore {
    inner: Mutex<Vec<Message>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one message. Stored messages are never mutated afterwards.
    pub fn record(&self, message: Message) {
        self.lock().push(message);
    }

    /// Every stored message, insertion order.
    pub fn all(&self) -> Vec<Message> {
        self.lock().clone()
    }

    /// Messages sent to or by `username`, insertion order (not necessarily
    /// timestamp order).
    pub fn for_peer(&self, username: &str) -> Vec<Message> {
        self.lock()
            .iter()
            .filter(|m| m.sender == username || m.recipient == username)
            .cloned()
            .collect()
    }

    /// Messages in one conversation, insertion order.
    pub fn for_conversation(&self, conversation_id: &str) -> Vec<Message> {
        self.lock()
            .iter()
            .filter(|m| m.conversation_id.as_deref() == Some(conversation_id))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Message>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(sender: &str, recipient: &str, conv: Option<&str>) -> Message {
        Message::new(
            sender,
            recipient,
            "t",
            "c",
            conv.map(str::to_string),
            None,
        )
    }

    #[test]
    fn insertion_order_preserved() {
        let store = ConversationStore::new();
        let first = msg("alice", "bob", None);
        let second = msg("bob", "alice", None);
        store.record(first.clone());
        store.record(second.clone());
        assert_eq!(store.all(), vec![first, second]);
    }

    #[test]
    fn for_peer_matches_both_directions() {
        let store = ConversationStore::new();
        store.record(msg("alice", "bob", None));
        store.record(msg("bob", "alice", None));
        store.record(msg("carol", "dave", None));
        let bobs = store.for_peer("bob");
        assert_eq!(bobs.len(), 2);
        assert!(store.for_peer("eve").is_empty());
    }

    #[test]
    fn duplicate_ids_yield_two_entries() {
        let store = ConversationStore::new();
        let m = msg("alice", "bob", None);
        store.record(m.clone());
        store.record(m);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn for_conversation_filters_by_id() {
        let store = ConversationStore::new();
        store.record(msg("alice", "bob", Some("aaaa1111")));
        store.record(msg("bob", "alice", Some("aaaa1111")));
        store.record(msg("alice", "carol", Some("bbbb2222")));
        store.record(msg("alice", "dave", None));
        assert_eq!(store.for_conversation("aaaa1111").len(), 2);
        assert_eq!(store.for_conversation("bbbb2222").len(), 1);
        assert!(store.for_conversation("cccc3333").is_empty());
    }
}

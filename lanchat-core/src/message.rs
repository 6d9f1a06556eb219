//! Message records and conversation identity.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Width of a derived conversation id in hex characters.
const CONVERSATION_ID_HEX: usize = 8;

/// A direct message between two usernames. `id` is assigned once at creation
/// and never changes; `timestamp` is the sender's clock on the wire and may be
/// restamped to receipt time by the receiving side before storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender: String,
    pub recipient: String,
    pub title: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl Message {
    /// Build an outbound message: fresh v4 UUID, stamped with the current time.
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        conversation_id: Option<String>,
        reply_to: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender: sender.into(),
            recipient: recipient.into(),
            title: title.into(),
            content: content.into(),
            timestamp: Utc::now(),
            conversation_id,
            reply_to,
        }
    }
}

/// Derive the conversation id for a pair of usernames. Order-independent:
/// the pair is sorted lexicographically before hashing, so both ends converge
/// on the same id without coordination. The id is SHA-256 truncated to
/// 8 hex chars; collisions across unrelated pairs are an accepted risk at
/// this width, not something the protocol defends against.
pub fn conversation_id(user_a: &str, user_b: &str) -> String {
    let (first, second) = if user_a <= user_b {
        (user_a, user_b)
    } else {
        (user_b, user_a)
    };
    let digest = Sha256::digest(format!("{first}:{second}").as_bytes());
    let mut id = String::with_capacity(CONVERSATION_ID_HEX);
    for byte in &digest[..CONVERSATION_ID_HEX / 2] {
        let _ = write!(id, "{byte:02x}");
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_id_order_independent() {
        assert_eq!(conversation_id("alice", "bob"), conversation_id("bob", "alice"));
        assert_eq!(conversation_id("zed", "ann"), conversation_id("ann", "zed"));
    }

    #[test]
    fn conversation_id_fixed_width() {
        assert_eq!(conversation_id("alice", "bob").len(), CONVERSATION_ID_HEX);
        assert_eq!(conversation_id("", "").len(), CONVERSATION_ID_HEX);
    }

    #[test]
    fn conversation_id_distinct_pairs_differ() {
        assert_ne!(
            conversation_id("alice", "bob"),
            conversation_id("alice", "carol")
        );
    }

    #[test]
    fn conversation_id_stable_across_calls() {
        assert_eq!(conversation_id("alice", "bob"), conversation_id("alice", "bob"));
    }

    #[test]
    fn new_message_has_unique_id() {
        let a = Message::new("alice", "bob", "hi", "hello", None, None);
        let b = Message::new("alice", "bob", "hi", "hello", None, None);
        assert!(!a.id.is_empty());
        assert_ne!(a.id, b.id);
    }
}

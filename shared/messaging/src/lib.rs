//! Messaging models shared by marketchat clients.
//!
//! Records mirror what the marketplace backend persists for listing chats:
//! a sender, a receiver, the listing the exchange is about, and the text.

pub mod frames;
pub mod inbox;
pub mod timestamp;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

pub use frames::{InboundFrame, OutboundFrame};
pub use inbox::{Inbox, InboxListing, ListingThreads, Thread};

/// Marketplace user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the listing a conversation is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListingId(pub i64);

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a chat message.
///
/// Persisted records carry the id the server assigned. Messages echoed
/// locally before the server has seen them carry a placeholder that can
/// never collide with a server id, even when the numbers happen to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageId {
    Server(i64),
    Local(i64),
}

impl MessageId {
    pub fn value(&self) -> i64 {
        match self {
            Self::Server(id) | Self::Local(id) => *id,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

impl Serialize for MessageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.value())
    }
}

// Anything arriving over the wire was assigned by the server.
impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        i64::deserialize(deserializer).map(MessageId::Server)
    }
}

/// A single chat message about a listing.
///
/// Field names follow the backend's snake_case records; camelCase spellings
/// and `body` are accepted on input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    #[serde(alias = "senderId")]
    pub sender_id: UserId,
    #[serde(alias = "receiverId")]
    pub receiver_id: UserId,
    #[serde(alias = "listingId")]
    pub listing_id: ListingId,
    #[serde(rename = "message", alias = "body")]
    pub body: String,
    #[serde(alias = "createdAt", with = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// Client-generated reference attached to outbound frames.
    #[serde(default, alias = "clientRef", skip_serializing_if = "Option::is_none")]
    pub client_ref: Option<Uuid>,
}

impl ChatMessage {
    /// Builds the optimistic copy of a message the local user just sent.
    pub fn local(
        local_id: i64,
        sender_id: UserId,
        receiver_id: UserId,
        listing_id: ListingId,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: MessageId::Local(local_id),
            sender_id,
            receiver_id,
            listing_id,
            body: body.into(),
            created_at: Utc::now(),
            client_ref: Some(Uuid::new_v4()),
        }
    }

    /// The participant that is not `local_user`.
    pub fn counterpart(&self, local_user: UserId) -> UserId {
        if self.sender_id == local_user {
            self.receiver_id
        } else {
            self.sender_id
        }
    }

    pub fn involves(&self, user: UserId) -> bool {
        self.sender_id == user || self.receiver_id == user
    }

    pub fn is_local(&self) -> bool {
        self.id.is_local()
    }
}

/// Messaging-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

pub type Result<T> = std::result::Result<T, MessagingError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_camel_case_record() {
        let raw = r#"{"id":7,"senderId":2,"receiverId":5,"listingId":99,"body":"hello","createdAt":"2024-01-01T00:00:00Z"}"#;
        let message: ChatMessage = serde_json::from_str(raw).unwrap();

        assert_eq!(message.id, MessageId::Server(7));
        assert_eq!(message.sender_id, UserId(2));
        assert_eq!(message.receiver_id, UserId(5));
        assert_eq!(message.listing_id, ListingId(99));
        assert_eq!(message.body, "hello");
        assert_eq!(
            message.created_at,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(message.client_ref, None);
    }

    #[test]
    fn parses_backend_broadcast_record() {
        let raw = r#"{"id":42,"sender_id":5,"receiver_id":2,"listing_id":99,"message":"hi","created_at":"2024-03-05 10:15:30.250000"}"#;
        let message: ChatMessage = serde_json::from_str(raw).unwrap();

        assert_eq!(message.body, "hi");
        assert_eq!(message.created_at.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn serializes_in_backend_shape() {
        let message = ChatMessage {
            id: MessageId::Server(3),
            sender_id: UserId(1),
            receiver_id: UserId(2),
            listing_id: ListingId(4),
            body: "ok".into(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            client_ref: None,
        };
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["id"], 3);
        assert_eq!(value["message"], "ok");
        assert_eq!(value["created_at"], "2024-01-01T12:00:00.000Z");
        assert!(value.get("client_ref").is_none());
    }

    #[test]
    fn local_ids_never_equal_server_ids() {
        assert_ne!(MessageId::Local(42), MessageId::Server(42));
    }

    #[test]
    fn counterpart_is_the_other_participant() {
        let message = ChatMessage::local(1, UserId(5), UserId(2), ListingId(9), "hey");
        assert_eq!(message.counterpart(UserId(5)), UserId(2));
        assert_eq!(message.counterpart(UserId(2)), UserId(5));
        assert!(message.is_local());
        assert!(message.client_ref.is_some());
    }
}

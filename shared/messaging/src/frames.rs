//! Live channel framing.

use crate::{ChatMessage, Result, UserId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// Frame received on a listing channel.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Message(ChatMessage),
    /// Typing indicators, server errors and anything else tagged with a
    /// `type` other than `"message"`.
    Other { kind: String },
}

impl InboundFrame {
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        if let Some(kind) = value.get("type").and_then(Value::as_str) {
            if kind != "message" {
                return Ok(Self::Other {
                    kind: kind.to_string(),
                });
            }
        }
        Ok(Self::Message(serde_json::from_value(value)?))
    }
}

/// Frame sent on a listing channel. Sender and listing are implied by the
/// authenticated connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub receiver_id: UserId,
    #[serde(rename = "message")]
    pub body: String,
    pub client_ref: Uuid,
}

impl OutboundFrame {
    pub fn for_message(message: &ChatMessage) -> Self {
        Self {
            receiver_id: message.receiver_id,
            body: message.body.clone(),
            client_ref: message.client_ref.unwrap_or_else(Uuid::new_v4),
        }
    }

    pub fn to_text(&self) -> String {
        json!({
            "receiver_id": self.receiver_id.0,
            "message": self.body,
            "client_ref": self.client_ref.to_string(),
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ListingId, MessageId, MessagingError};

    #[test]
    fn untagged_record_is_a_message() {
        let frame = InboundFrame::parse(
            r#"{"id":1,"sender_id":2,"receiver_id":3,"listing_id":4,"message":"yo","created_at":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        match frame {
            InboundFrame::Message(message) => {
                assert_eq!(message.id, MessageId::Server(1));
                assert_eq!(message.listing_id, ListingId(4));
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn tagged_message_is_a_message() {
        let frame = InboundFrame::parse(
            r#"{"type":"message","id":1,"sender_id":2,"receiver_id":3,"listing_id":4,"message":"yo","created_at":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(matches!(frame, InboundFrame::Message(_)));
    }

    #[test]
    fn other_frame_types_are_skipped() {
        let frame = InboundFrame::parse(r#"{"type":"typing","user_id":2}"#).unwrap();
        assert_eq!(
            frame,
            InboundFrame::Other {
                kind: "typing".into()
            }
        );
    }

    #[test]
    fn malformed_payloads_are_errors() {
        assert!(matches!(
            InboundFrame::parse("not json"),
            Err(MessagingError::MalformedFrame(_))
        ));
        assert!(InboundFrame::parse(r#"{"id":1}"#).is_err());
        assert!(InboundFrame::parse("[1,2,3]").is_err());
    }

    #[test]
    fn outbound_frame_matches_backend_contract() {
        let message = ChatMessage::local(10, UserId(5), UserId(2), ListingId(99), "hi");
        let frame = OutboundFrame::for_message(&message);
        let value: Value = serde_json::from_str(&frame.to_text()).unwrap();

        assert_eq!(value["receiver_id"], 2);
        assert_eq!(value["message"], "hi");
        assert_eq!(
            value["client_ref"],
            message.client_ref.unwrap().to_string()
        );

        let decoded: OutboundFrame = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, frame);
    }
}

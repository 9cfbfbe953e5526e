//! Duplicate suppression for inbound messages.
//!
//! An inbound message is the same exchange as one already displayed when
//! any of these hold, checked in order:
//!
//! 1. both carry the same client reference (exact echo of a local send),
//! 2. both carry the same id,
//! 3. same sender and same text, created less than `window` apart.
//!
//! The last rule reconciles an optimistic echo with the copy the server
//! broadcasts back when the server does not return the client reference.

use marketchat_messaging::ChatMessage;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupePolicy {
    pub window: Duration,
}

impl Default for DedupePolicy {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(1000),
        }
    }
}

impl DedupePolicy {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn is_duplicate(&self, present: &[ChatMessage], incoming: &ChatMessage) -> bool {
        present.iter().any(|existing| self.same_exchange(existing, incoming))
    }

    pub fn same_exchange(&self, existing: &ChatMessage, incoming: &ChatMessage) -> bool {
        if let (Some(a), Some(b)) = (existing.client_ref, incoming.client_ref) {
            if a == b {
                return true;
            }
        }
        if existing.id == incoming.id {
            return true;
        }
        existing.sender_id == incoming.sender_id
            && existing.body == incoming.body
            && self.within_window(existing, incoming)
    }

    fn within_window(&self, a: &ChatMessage, b: &ChatMessage) -> bool {
        let window = self.window.as_micros();
        (a.created_at - b.created_at)
            .num_microseconds()
            .is_some_and(|delta| u128::from(delta.unsigned_abs()) < window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as TimeDelta, TimeZone, Utc};
    use marketchat_messaging::{ListingId, MessageId, UserId};
    use uuid::Uuid;

    fn server(id: i64, sender: i64, body: &str, offset_ms: i64) -> ChatMessage {
        ChatMessage {
            id: MessageId::Server(id),
            sender_id: UserId(sender),
            receiver_id: UserId(9),
            listing_id: ListingId(1),
            body: body.into(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + TimeDelta::milliseconds(offset_ms),
            client_ref: None,
        }
    }

    #[test]
    fn same_id_is_duplicate() {
        let policy = DedupePolicy::default();
        let first = server(7, 2, "hello", 0);
        let resent = server(7, 3, "different", 60_000);

        assert!(policy.is_duplicate(&[first], &resent));
    }

    #[test]
    fn echo_within_window_is_duplicate() {
        let policy = DedupePolicy::default();
        let mut optimistic = server(0, 5, "hi", 0);
        optimistic.id = MessageId::Local(1_700_000_000_000);
        let echo = server(42, 5, "hi", 999);

        assert!(policy.is_duplicate(&[optimistic.clone()], &echo));

        let late = server(42, 5, "hi", 1000);
        assert!(!policy.is_duplicate(&[optimistic.clone()], &late));

        let early = server(43, 5, "hi", -400);
        assert!(policy.is_duplicate(&[optimistic], &early));
    }

    #[test]
    fn different_sender_or_text_is_distinct() {
        let policy = DedupePolicy::default();
        let present = [server(1, 5, "hi", 0)];

        assert!(!policy.is_duplicate(&present, &server(2, 6, "hi", 10)));
        assert!(!policy.is_duplicate(&present, &server(3, 5, "hi!", 10)));
    }

    #[test]
    fn matching_client_ref_is_duplicate_regardless_of_clock() {
        let policy = DedupePolicy::default();
        let reference = Uuid::new_v4();
        let mut optimistic = server(0, 5, "hi", 0);
        optimistic.id = MessageId::Local(1);
        optimistic.client_ref = Some(reference);
        let mut echo = server(42, 5, "hi", 5_000);
        echo.client_ref = Some(reference);

        assert!(policy.is_duplicate(&[optimistic], &echo));
    }

    #[test]
    fn window_is_tunable() {
        let policy = DedupePolicy::new(Duration::from_secs(5));
        let present = [server(1, 5, "hi", 0)];
        assert!(policy.is_duplicate(&present, &server(2, 5, "hi", 4_000)));
    }
}

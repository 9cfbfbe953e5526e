//! Channel state shared between the handle and its runtime task.
//!
//! Every mutation happens under one lock and publishes its event before the
//! lock is released, so subscribers observe changes in the order they were
//! applied. Once closed, the core refuses all further mutation.

use super::{Backoff, ChannelEvent, ConnectionState, DedupePolicy, MessageOrigin, SendOutcome};
use super::queue::PendingQueue;
use crate::transport::FrameSender;
use chrono::Utc;
use marketchat_messaging::{ChatMessage, InboundFrame, ListingId, OutboundFrame, UserId};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// What happened to one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ingest {
    Accepted,
    Duplicate,
    ForeignListing,
    Ignored,
    Malformed,
    Closed,
}

pub(crate) struct ChannelCore {
    listing_id: ListingId,
    local_user: UserId,
    state: ConnectionState,
    attempt: u32,
    messages: Vec<ChatMessage>,
    pending: PendingQueue,
    link: Option<FrameSender>,
    dedupe: DedupePolicy,
    backoff: Backoff,
    next_local_id: i64,
    events: broadcast::Sender<ChannelEvent>,
}

impl ChannelCore {
    pub(crate) fn new(
        listing_id: ListingId,
        local_user: UserId,
        dedupe: DedupePolicy,
        backoff: Backoff,
        events: broadcast::Sender<ChannelEvent>,
    ) -> Self {
        Self {
            listing_id,
            local_user,
            state: ConnectionState::Idle,
            attempt: 0,
            messages: Vec::new(),
            pending: PendingQueue::new(),
            link: None,
            dedupe,
            backoff,
            next_local_id: Utc::now().timestamp_millis(),
            events,
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.state
    }

    pub(crate) fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn mark_unauthenticated(&mut self) {
        self.set_state(ConnectionState::Unauthenticated);
    }

    pub(crate) fn send(&mut self, counterpart: UserId, body: &str) -> SendOutcome {
        match self.state {
            ConnectionState::Closed => return SendOutcome::Closed,
            ConnectionState::Unauthenticated => return SendOutcome::Unauthenticated,
            _ => {}
        }
        let body = body.trim();
        if body.is_empty() {
            return SendOutcome::Ignored;
        }

        let local_id = self.next_local_id;
        self.next_local_id += 1;
        let message = ChatMessage::local(
            local_id,
            self.local_user,
            counterpart,
            self.listing_id,
            body,
        );
        let text = OutboundFrame::for_message(&message).to_text();

        let outcome = match self.transmit(text) {
            Ok(()) => SendOutcome::Transmitted,
            Err(text) => {
                self.pending.enqueue(text);
                SendOutcome::Queued
            }
        };
        debug!(
            listing_id = %self.listing_id,
            receiver_id = %counterpart,
            ?outcome,
            pending = self.pending.len(),
            "outbound message"
        );

        self.append(message, MessageOrigin::Local);
        outcome
    }

    fn transmit(&self, text: String) -> Result<(), String> {
        match (&self.state, &self.link) {
            (ConnectionState::Connected, Some(link)) => link.send(text),
            _ => Err(text),
        }
    }

    pub(crate) fn connecting(&mut self) -> bool {
        if self.state == ConnectionState::Closed {
            return false;
        }
        self.set_state(ConnectionState::Connecting);
        true
    }

    /// Adopts a fresh connection and flushes the pending queue through it.
    /// Returns the number of flushed frames, or `None` if the channel was
    /// closed in the meantime.
    pub(crate) fn connected(&mut self, link: FrameSender) -> Option<usize> {
        if self.state == ConnectionState::Closed {
            return None;
        }
        self.attempt = 0;
        let flushed = self.pending.drain_with(|text| link.send(text));
        self.link = Some(link);
        self.set_state(ConnectionState::Connected);
        Some(flushed)
    }

    /// Records a lost or failed connection. Returns the reconnection attempt
    /// number and the delay to wait before it.
    pub(crate) fn disconnected(&mut self) -> Option<(u32, Duration)> {
        if self.state == ConnectionState::Closed {
            return None;
        }
        self.link = None;
        self.attempt = self.attempt.saturating_add(1);
        let delay = self.backoff.delay(self.attempt);
        self.set_state(ConnectionState::Disconnected {
            attempt: self.attempt,
        });
        Some((self.attempt, delay))
    }

    pub(crate) fn ingest(&mut self, text: &str) -> Ingest {
        if self.state == ConnectionState::Closed {
            return Ingest::Closed;
        }

        let message = match InboundFrame::parse(text) {
            Ok(InboundFrame::Message(message)) => message,
            Ok(InboundFrame::Other { kind }) => {
                debug!(listing_id = %self.listing_id, kind, "skipping non-message frame");
                return Ingest::Ignored;
            }
            Err(err) => {
                warn!(listing_id = %self.listing_id, %err, "discarding malformed frame");
                return Ingest::Malformed;
            }
        };

        if message.listing_id != self.listing_id {
            debug!(
                listing_id = %self.listing_id,
                foreign_listing = %message.listing_id,
                "dropping message for another listing"
            );
            return Ingest::ForeignListing;
        }
        if self.dedupe.is_duplicate(&self.messages, &message) {
            debug!(listing_id = %self.listing_id, id = message.id.value(), "suppressing duplicate");
            return Ingest::Duplicate;
        }

        self.append(message, MessageOrigin::Remote);
        Ingest::Accepted
    }

    /// Places previously persisted messages ahead of anything that arrived
    /// live while the history request was in flight.
    pub(crate) fn merge_history(&mut self, history: Vec<ChatMessage>) -> usize {
        if self.state == ConnectionState::Closed {
            return 0;
        }

        let mut accepted: Vec<ChatMessage> = Vec::with_capacity(history.len());
        for message in history {
            if message.listing_id != self.listing_id
                || accepted.iter().any(|m| m.id == message.id)
                || self.dedupe.is_duplicate(&self.messages, &message)
            {
                continue;
            }
            accepted.push(message);
        }

        let merged = accepted.len();
        if merged > 0 {
            let _ = self.events.send(ChannelEvent::History(accepted.clone()));
        }
        accepted.append(&mut self.messages);
        self.messages = accepted;
        merged
    }

    pub(crate) fn close(&mut self) -> bool {
        if self.state == ConnectionState::Closed {
            return false;
        }
        if !self.pending.is_empty() {
            debug!(
                listing_id = %self.listing_id,
                discarded = self.pending.len(),
                "closing with unsent messages"
            );
        }
        self.link = None;
        self.pending.clear();
        self.set_state(ConnectionState::Closed);
        true
    }

    fn append(&mut self, message: ChatMessage, origin: MessageOrigin) {
        self.messages.push(message.clone());
        let _ = self.events.send(ChannelEvent::Message { message, origin });
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            self.state = state;
            let _ = self.events.send(ChannelEvent::State(state));
        }
    }
}

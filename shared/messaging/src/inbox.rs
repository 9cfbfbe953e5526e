//! Conversation list grouped by listing, then by counterpart.
//!
//! The backend serves the initial list from `GET /chat/messages`; after that
//! the client folds every message it sends or receives into the same
//! structure so the list stays current without refetching.

use crate::{timestamp, ChatMessage, ListingId, MessageId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Listing entry as returned by `GET /chat/messages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxListing {
    pub listing_id: ListingId,
    #[serde(default)]
    pub listing_title: Option<String>,
    #[serde(default)]
    pub chats: Vec<InboxChat>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxChat {
    pub user_id: UserId,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub messages: Vec<InboxMessage>,
}

/// Inbox records omit the listing id; it comes from the enclosing entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxMessage {
    pub id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    #[serde(rename = "message")]
    pub body: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl InboxMessage {
    fn into_chat_message(self, listing_id: ListingId) -> ChatMessage {
        ChatMessage {
            id: self.id,
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            listing_id,
            body: self.body,
            created_at: self.created_at,
            client_ref: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Thread {
    pub counterpart_id: UserId,
    pub counterpart_name: Option<String>,
    pub messages: Vec<ChatMessage>,
}

impl Thread {
    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.messages.iter().map(|m| m.created_at).max()
    }

    fn contains(&self, message: &ChatMessage) -> bool {
        self.messages.iter().any(|existing| {
            existing.id == message.id
                || matches!((existing.client_ref, message.client_ref), (Some(a), Some(b)) if a == b)
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListingThreads {
    pub listing_id: ListingId,
    pub listing_title: Option<String>,
    pub threads: Vec<Thread>,
}

impl ListingThreads {
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.threads.iter().filter_map(Thread::last_activity).max()
    }
}

/// The local user's conversations, most recently active first.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbox {
    local_user: UserId,
    listings: Vec<ListingThreads>,
}

impl Inbox {
    pub fn new(local_user: UserId) -> Self {
        Self {
            local_user,
            listings: Vec::new(),
        }
    }

    pub fn from_wire(local_user: UserId, wire: Vec<InboxListing>) -> Self {
        let mut listings: Vec<ListingThreads> = wire
            .into_iter()
            .map(|listing| {
                let listing_id = listing.listing_id;
                let mut threads: Vec<Thread> = listing
                    .chats
                    .into_iter()
                    .map(|chat| Thread {
                        counterpart_id: chat.user_id,
                        counterpart_name: chat.user_name,
                        messages: chat
                            .messages
                            .into_iter()
                            .map(|m| m.into_chat_message(listing_id))
                            .collect(),
                    })
                    .collect();
                threads.sort_by(|a, b| b.last_activity().cmp(&a.last_activity()));
                ListingThreads {
                    listing_id,
                    listing_title: listing.listing_title,
                    threads,
                }
            })
            .collect();
        listings.sort_by(|a, b| b.last_activity().cmp(&a.last_activity()));

        Self {
            local_user,
            listings,
        }
    }

    pub fn local_user(&self) -> UserId {
        self.local_user
    }

    pub fn listings(&self) -> &[ListingThreads] {
        &self.listings
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    pub fn thread(&self, listing_id: ListingId, counterpart_id: UserId) -> Option<&Thread> {
        self.listings
            .iter()
            .find(|l| l.listing_id == listing_id)?
            .threads
            .iter()
            .find(|t| t.counterpart_id == counterpart_id)
    }

    /// Folds a sent or received message into the list and moves its thread
    /// and listing to the front. Returns `false` when the message was already
    /// recorded or does not involve the local user.
    pub fn record(&mut self, message: &ChatMessage) -> bool {
        if !message.involves(self.local_user) {
            return false;
        }
        let counterpart_id = message.counterpart(self.local_user);

        let listing_pos = match self
            .listings
            .iter()
            .position(|l| l.listing_id == message.listing_id)
        {
            Some(pos) => pos,
            None => {
                self.listings.push(ListingThreads {
                    listing_id: message.listing_id,
                    listing_title: None,
                    threads: Vec::new(),
                });
                self.listings.len() - 1
            }
        };
        let mut listing = self.listings.remove(listing_pos);

        let thread_pos = listing
            .threads
            .iter()
            .position(|t| t.counterpart_id == counterpart_id);
        let mut thread = match thread_pos {
            Some(pos) => listing.threads.remove(pos),
            None => Thread {
                counterpart_id,
                counterpart_name: None,
                messages: Vec::new(),
            },
        };

        let added = !thread.contains(message);
        if added {
            thread.messages.push(message.clone());
        }
        listing.threads.insert(0, thread);
        self.listings.insert(0, listing);
        added
    }
}

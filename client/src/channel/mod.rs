//! Real-time conversation channels, one per listing.
//!
//! [`ChannelManager::open`] starts a background runtime that keeps a
//! connection to the listing's endpoint alive, reconnecting with exponential
//! backoff. Messages typed by the user appear immediately as optimistic
//! entries. While the connection is down their frames wait in a FIFO queue
//! that is flushed as soon as a connection is re-established. Inbound
//! messages for other listings and repeats of already displayed exchanges
//! are dropped.

mod backoff;
mod dedupe;
mod queue;
mod runtime;
mod state;

pub use backoff::Backoff;
pub use dedupe::DedupePolicy;

use self::runtime::ChannelRuntime;
use self::state::ChannelCore;
use crate::api::{load_history, HistorySource};
use crate::config::ClientConfig;
use crate::session::Session;
use crate::transport::Connector;
use marketchat_messaging::{ChatMessage, ListingId, UserId};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Opened, runtime not started yet.
    Idle,
    /// No credential; the channel never connects.
    Unauthenticated,
    Connecting,
    Connected,
    /// Waiting before reconnection attempt `attempt`.
    Disconnected { attempt: u32 },
    Closed,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    pub fn is_reconnecting(&self) -> bool {
        matches!(self, Self::Connecting | Self::Disconnected { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrigin {
    Local,
    Remote,
}

#[derive(Debug, Clone)]
pub enum ChannelEvent {
    Message {
        message: ChatMessage,
        origin: MessageOrigin,
    },
    /// Persisted messages, delivered as one batch and placed ahead of
    /// everything already in the list.
    History(Vec<ChatMessage>),
    State(ConnectionState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to the live connection.
    Transmitted,
    /// Connection down; will be sent after reconnecting.
    Queued,
    /// Blank after trimming.
    Ignored,
    Unauthenticated,
    Closed,
}

impl SendOutcome {
    /// Whether the message became part of the conversation.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Transmitted | Self::Queued)
    }
}

pub(crate) struct Shared {
    core: Mutex<ChannelCore>,
    events: broadcast::Sender<ChannelEvent>,
    // Subscribed before any task starts so the first subscriber sees every event.
    first_subscriber: Mutex<Option<broadcast::Receiver<ChannelEvent>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Shared {
    pub(crate) fn core(&self) -> MutexGuard<'_, ChannelCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Opens listing channels against one backend.
#[derive(Clone)]
pub struct ChannelManager {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    history: Option<Arc<dyn HistorySource>>,
}

impl ChannelManager {
    pub fn new(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            history: None,
        }
    }

    /// Load persisted history into every channel opened from now on.
    pub fn with_history(mut self, source: Arc<dyn HistorySource>) -> Self {
        self.history = Some(source);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Opens the channel for `listing_id`. Must be called within a tokio
    /// runtime. Without a credential the channel stays offline and refuses
    /// sends, but history is still loaded.
    pub fn open(&self, listing_id: ListingId, session: &Session) -> ChannelHandle {
        let (events, first) = broadcast::channel(EVENT_CAPACITY);
        let core = ChannelCore::new(
            listing_id,
            session.user_id,
            DedupePolicy::new(self.config.dedupe_window),
            self.config.backoff,
            events.clone(),
        );
        let shared = Arc::new(Shared {
            core: Mutex::new(core),
            events,
            first_subscriber: Mutex::new(Some(first)),
            tasks: Mutex::new(Vec::new()),
        });

        let mut tasks = Vec::new();
        match &session.credential {
            Some(credential) => {
                let runtime = ChannelRuntime::new(
                    Arc::clone(&shared),
                    Arc::clone(&self.connector),
                    self.config.channel_url(listing_id, credential),
                    listing_id,
                );
                tasks.push(tokio::spawn(runtime.run()));
            }
            None => {
                info!(%listing_id, user_id = %session.user_id, "no credential, channel stays offline");
                shared.core().mark_unauthenticated();
            }
        }

        if let Some(source) = &self.history {
            let source = Arc::clone(source);
            let shared = Arc::clone(&shared);
            tasks.push(tokio::spawn(async move {
                let history = load_history(source.as_ref(), listing_id).await;
                let merged = shared.core().merge_history(history);
                debug!(%listing_id, merged, "history merged");
            }));
        }

        *shared.tasks.lock().unwrap_or_else(PoisonError::into_inner) = tasks;

        ChannelHandle {
            listing_id,
            local_user: session.user_id,
            shared,
        }
    }
}

/// An open listing channel. Dropping the handle closes it.
pub struct ChannelHandle {
    listing_id: ListingId,
    local_user: UserId,
    shared: Arc<Shared>,
}

impl ChannelHandle {
    pub fn listing_id(&self) -> ListingId {
        self.listing_id
    }

    pub fn local_user(&self) -> UserId {
        self.local_user
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.core().state()
    }

    /// Snapshot of every message in display order.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.shared.core().messages().to_vec()
    }

    /// Messages exchanged with `counterpart` on this listing.
    pub fn conversation(&self, counterpart: UserId) -> Vec<ChatMessage> {
        self.shared
            .core()
            .messages()
            .iter()
            .filter(|message| message.counterpart(self.local_user) == counterpart)
            .cloned()
            .collect()
    }

    /// Frames waiting for a connection.
    pub fn pending(&self) -> usize {
        self.shared.core().pending_len()
    }

    /// Event stream. The first call also receives everything emitted since
    /// the channel was opened. A receiver that lags behind should resync
    /// from [`ChannelHandle::messages`].
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.shared
            .first_subscriber
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_else(|| self.shared.events.subscribe())
    }

    pub fn send(&self, counterpart: UserId, body: &str) -> SendOutcome {
        self.shared.core().send(counterpart, body)
    }

    /// Stops the runtime and any pending reconnection. Idempotent.
    pub fn close(&self) {
        let closed = self.shared.core().close();
        let tasks = std::mem::take(
            &mut *self
                .shared
                .tasks
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for task in tasks {
            task.abort();
        }
        if closed {
            info!(listing_id = %self.listing_id, "channel closed");
        }
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.close();
    }
}

//! Thin presentation layer over an open channel.

use crate::channel::{ChannelHandle, ConnectionState, SendOutcome};
use marketchat_messaging::{ChatMessage, UserId};

/// Text the user is typing.
#[derive(Debug, Default, Clone)]
pub struct Composer {
    draft: String,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn clear(&mut self) {
        self.draft.clear();
    }
}

/// One conversation: a listing channel narrowed to a single counterpart.
pub struct ConversationView<'a> {
    channel: &'a ChannelHandle,
    counterpart: UserId,
}

impl<'a> ConversationView<'a> {
    pub fn new(channel: &'a ChannelHandle, counterpart: UserId) -> Self {
        Self {
            channel,
            counterpart,
        }
    }

    pub fn counterpart(&self) -> UserId {
        self.counterpart
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.channel.conversation(self.counterpart)
    }

    pub fn state(&self) -> ConnectionState {
        self.channel.state()
    }

    /// Whether `message` was written by the local user.
    pub fn is_own(&self, message: &ChatMessage) -> bool {
        message.sender_id == self.channel.local_user()
    }

    /// Sends the draft. It is cleared only when the message was accepted,
    /// so nothing typed is lost on refusal.
    pub fn submit(&self, composer: &mut Composer) -> SendOutcome {
        let outcome = self.channel.send(self.counterpart, composer.draft());
        if outcome.is_accepted() {
            composer.clear();
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelManager;
    use crate::config::ClientConfig;
    use crate::session::Session;
    use crate::transport::memory::{ScriptedConnector, Step};
    use marketchat_messaging::ListingId;
    use std::time::Duration;
    use url::Url;

    fn manager() -> ChannelManager {
        let (connector, _peers) = ScriptedConnector::new(Vec::<Step>::new());
        let config = ClientConfig::new(Url::parse("http://localhost:8000").unwrap()).unwrap();
        ChannelManager::new(config, connector)
    }

    #[tokio::test(start_paused = true)]
    async fn submit_clears_draft_once_queued() {
        let channel = manager().open(ListingId(1), &Session::authenticated(UserId(5), "t"));
        tokio::time::sleep(Duration::from_millis(10)).await;
        let view = ConversationView::new(&channel, UserId(2));
        let mut composer = Composer::new();

        composer.set_draft("   ");
        assert_eq!(view.submit(&mut composer), SendOutcome::Ignored);
        assert_eq!(composer.draft(), "   ");

        composer.set_draft("is it still available?");
        assert_eq!(view.submit(&mut composer), SendOutcome::Queued);
        assert_eq!(composer.draft(), "");

        let messages = view.messages();
        assert_eq!(messages.len(), 1);
        assert!(view.is_own(&messages[0]));
    }

    #[tokio::test]
    async fn refused_submit_keeps_draft() {
        let channel = manager().open(ListingId(1), &Session::anonymous(UserId(5)));
        let view = ConversationView::new(&channel, UserId(2));
        let mut composer = Composer::new();
        composer.set_draft("hello");

        assert_eq!(view.submit(&mut composer), SendOutcome::Unauthenticated);
        assert_eq!(composer.draft(), "hello");
        assert_eq!(view.state(), ConnectionState::Unauthenticated);
        assert!(view.messages().is_empty());
    }
}

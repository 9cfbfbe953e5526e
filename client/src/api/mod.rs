//! REST access to persisted conversations.

use crate::config::ClientConfig;
use crate::session::{Credential, Session};
use async_trait::async_trait;
use marketchat_messaging::{ChatMessage, Inbox, InboxListing, ListingId};
use reqwest::Client;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("request requires a credential")]
    Unauthenticated,
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Where a channel gets its persisted messages from.
#[async_trait]
pub trait HistorySource: Send + Sync + 'static {
    async fn fetch(&self, listing_id: ListingId) -> ApiResult<Vec<ChatMessage>>;
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    config: ClientConfig,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> ApiResult<Self> {
        let http = Client::builder().timeout(config.http_timeout).build()?;
        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    /// `GET /chat/{listing}`: every persisted message for the listing,
    /// oldest first.
    pub async fn chat_history(&self, listing_id: ListingId) -> ApiResult<Vec<ChatMessage>> {
        let messages = self
            .http
            .get(self.config.history_url(listing_id))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(messages)
    }

    /// `GET /chat/messages`: the caller's conversations grouped by listing.
    pub async fn inbox(&self, credential: &Credential) -> ApiResult<Vec<InboxListing>> {
        let listings = self
            .http
            .get(self.config.inbox_url())
            .bearer_auth(credential.expose())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(listings)
    }
}

#[async_trait]
impl HistorySource for ApiClient {
    async fn fetch(&self, listing_id: ListingId) -> ApiResult<Vec<ChatMessage>> {
        self.chat_history(listing_id).await
    }
}

/// Loads a listing's history. Failures are logged and yield an empty list.
pub async fn load_history(source: &dyn HistorySource, listing_id: ListingId) -> Vec<ChatMessage> {
    match source.fetch(listing_id).await {
        Ok(messages) => {
            debug!(%listing_id, count = messages.len(), "history loaded");
            messages
        }
        Err(err) => {
            warn!(%listing_id, %err, "history unavailable");
            Vec::new()
        }
    }
}

/// Loads the session's inbox. Without a credential, or on failure, the
/// inbox is empty.
pub async fn load_inbox(client: &ApiClient, session: &Session) -> Inbox {
    let Some(credential) = &session.credential else {
        debug!(user_id = %session.user_id, "no credential, skipping inbox");
        return Inbox::new(session.user_id);
    };
    match client.inbox(credential).await {
        Ok(listings) => Inbox::from_wire(session.user_id, listings),
        Err(err) => {
            warn!(user_id = %session.user_id, %err, "inbox unavailable");
            Inbox::new(session.user_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketchat_messaging::UserId;
    use url::Url;

    struct Unreachable;

    #[async_trait]
    impl HistorySource for Unreachable {
        async fn fetch(&self, _listing_id: ListingId) -> ApiResult<Vec<ChatMessage>> {
            Err(ApiError::Unauthenticated)
        }
    }

    #[tokio::test]
    async fn failed_history_is_empty() {
        assert!(load_history(&Unreachable, ListingId(1)).await.is_empty());
    }

    #[tokio::test]
    async fn anonymous_inbox_is_empty_without_a_request() {
        // Port 9 is discard; a request would fail, but none should be made.
        let config = ClientConfig::new(Url::parse("http://127.0.0.1:9").unwrap()).unwrap();
        let client = ApiClient::new(&config).unwrap();

        let inbox = load_inbox(&client, &Session::anonymous(UserId(5))).await;
        assert!(inbox.is_empty());
        assert_eq!(inbox.local_user(), UserId(5));
    }
}

use super::state::Ingest;
use super::Shared;
use crate::transport::{Connection, Connector, TransportError};
use marketchat_messaging::ListingId;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

/// Background task owning the connection lifecycle of one channel.
pub(crate) struct ChannelRuntime {
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    // Carries the credential; never log it.
    url: Url,
    listing_id: ListingId,
}

impl ChannelRuntime {
    pub(crate) fn new(
        shared: Arc<Shared>,
        connector: Arc<dyn Connector>,
        url: Url,
        listing_id: ListingId,
    ) -> Self {
        Self {
            shared,
            connector,
            url,
            listing_id,
        }
    }

    pub(crate) async fn run(self) {
        loop {
            if !self.shared.core().connecting() {
                return;
            }
            debug!(listing_id = %self.listing_id, "connecting");

            match self.connector.connect(&self.url).await {
                Ok(mut connection) => {
                    let flushed = self.shared.core().connected(connection.sender());
                    let Some(flushed) = flushed else {
                        return;
                    };
                    info!(listing_id = %self.listing_id, flushed, "channel connected");

                    match self.pump(&mut connection).await {
                        Some(err) => warn!(listing_id = %self.listing_id, %err, "channel dropped"),
                        None => return,
                    }
                }
                Err(err) => {
                    warn!(listing_id = %self.listing_id, %err, "connection attempt failed");
                }
            }

            let next = self.shared.core().disconnected();
            let Some((attempt, delay)) = next else {
                return;
            };
            info!(
                listing_id = %self.listing_id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "reconnecting after backoff"
            );
            sleep(delay).await;
        }
    }

    /// Feeds inbound frames to the core until the connection ends. Returns
    /// why it ended, or `None` once the channel has been closed.
    /// A writer that stops accepting frames ends the connection too, so
    /// queued sends are flushed by the next one.
    async fn pump(&self, connection: &mut Connection) -> Option<TransportError> {
        let writer = connection.sender();
        loop {
            let frame = tokio::select! {
                frame = connection.recv() => frame,
                _ = writer.closed() => {
                    return Some(TransportError::Io("writer stopped".into()));
                }
            };
            let text = match frame {
                Some(Ok(text)) => text,
                Some(Err(err)) => return Some(err),
                None => return Some(TransportError::Closed),
            };
            if self.shared.core().ingest(&text) == Ingest::Closed {
                return None;
            }
        }
    }
}

use super::{Connection, Connector, TransportError, TransportResult};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::debug;
use url::Url;

/// WebSocket transport used against the marketplace backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> TransportResult<Connection> {
        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let (mut sink, mut source) = stream.split();

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let write_failures = inbound_tx.clone();
        let writer = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                if let Err(err) = sink.send(Message::Text(frame)).await {
                    debug!(%err, "websocket write failed");
                    let _ = write_failures.send(Err(TransportError::Io(err.to_string())));
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader = tokio::spawn(async move {
            while let Some(item) = source.next().await {
                let event = match item {
                    Ok(Message::Text(text)) => Ok(text),
                    Ok(Message::Close(frame)) => {
                        debug!(?frame, "websocket closed by server");
                        break;
                    }
                    // Control frames are answered by tungstenite itself.
                    Ok(_) => continue,
                    Err(err) => Err(TransportError::Io(err.to_string())),
                };
                let failed = event.is_err();
                if inbound_tx.send(event).is_err() || failed {
                    break;
                }
            }
        });

        Ok(Connection::new(outbound_tx, inbound_rx)
            .with_pump(writer)
            .with_pump(reader))
    }
}

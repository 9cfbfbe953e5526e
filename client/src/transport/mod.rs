//! Persistent-connection transport for listing channels.
//!
//! A [`Connector`] turns an endpoint url into a [`Connection`]: a pair of
//! in-process queues fed by background pump tasks. Dropping the connection
//! stops the pumps and with them the underlying socket.

mod websocket;

#[cfg(test)]
pub(crate) mod memory;

pub use websocket::WsConnector;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("connection closed by peer")]
    Closed,
    #[error("transport error: {0}")]
    Io(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &Url) -> TransportResult<Connection>;
}

/// Write side of a live connection. Cheap to clone.
#[derive(Debug, Clone)]
pub struct FrameSender(mpsc::UnboundedSender<String>);

impl FrameSender {
    /// Hands the frame to the writer. On failure the frame is given back.
    pub fn send(&self, frame: String) -> Result<(), String> {
        self.0.send(frame).map_err(|err| err.0)
    }

    /// Resolves once the writer has stopped accepting frames.
    pub async fn closed(&self) {
        self.0.closed().await
    }
}

pub struct Connection {
    outbound: FrameSender,
    inbound: mpsc::UnboundedReceiver<TransportResult<String>>,
    pumps: Vec<JoinHandle<()>>,
}

impl Connection {
    pub fn new(
        outbound: mpsc::UnboundedSender<String>,
        inbound: mpsc::UnboundedReceiver<TransportResult<String>>,
    ) -> Self {
        Self {
            outbound: FrameSender(outbound),
            inbound,
            pumps: Vec::new(),
        }
    }

    pub fn with_pump(mut self, pump: JoinHandle<()>) -> Self {
        self.pumps.push(pump);
        self
    }

    pub fn sender(&self) -> FrameSender {
        self.outbound.clone()
    }

    /// Next inbound text frame. `None` once the peer has gone away.
    pub async fn recv(&mut self) -> Option<TransportResult<String>> {
        self.inbound.recv().await
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        for pump in self.pumps.drain(..) {
            pump.abort();
        }
    }
}

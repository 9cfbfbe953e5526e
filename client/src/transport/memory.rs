//! In-process connector for exercising channels without a network.

use super::{Connection, Connector, TransportError, TransportResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::Instant;
use url::Url;

/// Server end of an in-memory connection.
pub(crate) struct MemoryPeer {
    to_client: mpsc::UnboundedSender<TransportResult<String>>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl MemoryPeer {
    pub(crate) fn push(&self, frame: impl Into<String>) {
        let _ = self.to_client.send(Ok(frame.into()));
    }

    pub(crate) fn fail(&self, error: TransportError) {
        let _ = self.to_client.send(Err(error));
    }

    /// Stops accepting frames from the client while the inbound half stays
    /// open, like a writer that died on its own.
    pub(crate) fn stop_reading(&mut self) {
        self.from_client.close();
    }

    pub(crate) async fn next_frame(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    pub(crate) fn try_next_frame(&mut self) -> Option<String> {
        self.from_client.try_recv().ok()
    }
}

pub(crate) fn pair() -> (Connection, MemoryPeer) {
    let (to_client, inbound) = mpsc::unbounded_channel();
    let (outbound, from_client) = mpsc::unbounded_channel();
    (
        Connection::new(outbound, inbound),
        MemoryPeer {
            to_client,
            from_client,
        },
    )
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Step {
    Accept,
    Refuse,
}

/// Plays back a fixed list of connection outcomes, refusing once the list
/// runs out, and hands accepted peers to the test.
pub(crate) struct ScriptedConnector {
    script: Mutex<VecDeque<Step>>,
    attempts: Arc<Mutex<Vec<Instant>>>,
    peers: mpsc::UnboundedSender<MemoryPeer>,
}

impl ScriptedConnector {
    pub(crate) fn new(
        script: impl IntoIterator<Item = Step>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<MemoryPeer>) {
        let (peers, peer_rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            attempts: Arc::new(Mutex::new(Vec::new())),
            peers,
        });
        (connector, peer_rx)
    }

    pub(crate) fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, _url: &Url) -> TransportResult<Connection> {
        self.attempts.lock().unwrap().push(Instant::now());
        let step = self.script.lock().unwrap().pop_front().unwrap_or(Step::Refuse);
        match step {
            Step::Accept => {
                let (connection, peer) = pair();
                let _ = self.peers.send(peer);
                Ok(connection)
            }
            Step::Refuse => Err(TransportError::Connect("connection refused".into())),
        }
    }
}

//! Gossip service: WebSocket listener, outbound dialing, and fan-out.
//!
//! [`start`] binds the listener, spawns one dial task per configured peer
//! URL, and returns a [`GossipHandle`] for broadcasting plus an event
//! receiver the node layer drains. Each live connection gets a numeric
//! [`PeerId`]; outbound peers reconnect with a fixed delay and a URL is
//! dialed by exactly one task, so reconnection never duplicates links.
//!
//! The service carries frames only. Validation, deduplication, and the
//! decision to re-broadcast all live in the node layer, which holds the
//! state mutex this crate must never touch.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async, connect_async};
use tracing::{debug, info, warn};

use cobble_core::error::NetworkError;

use crate::config::{NetworkConfig, RECONNECT_DELAY};
use crate::protocol::PeerMessage;

/// Identifier of one live peer connection.
pub type PeerId = u64;

/// Events surfaced to the node layer.
#[derive(Debug)]
pub enum NetworkEvent {
    /// A decoded message arrived from a peer.
    Message { peer: PeerId, message: PeerMessage },
    /// A connection (inbound or outbound) became live.
    Connected { peer: PeerId },
    /// A connection closed.
    Disconnected { peer: PeerId },
}

/// Live connections: peer id → frame sender.
struct Registry {
    peers: Mutex<HashMap<PeerId, mpsc::UnboundedSender<Message>>>,
    next_id: AtomicU64,
}

impl Registry {
    fn new() -> Self {
        Self {
            peers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

/// Handle for sending frames to connected peers.
///
/// Sends enqueue onto per-connection channels and never block, so the
/// node may call them while holding its state lock.
#[derive(Clone)]
pub struct GossipHandle {
    registry: Arc<Registry>,
    local_addr: SocketAddr,
}

impl GossipHandle {
    /// Send a message to every connected peer.
    pub fn broadcast(&self, message: &PeerMessage) {
        self.broadcast_except(None, message);
    }

    /// Send a message to every connected peer except `except` (the peer
    /// the message came from, for flood-style relay).
    pub fn broadcast_except(&self, except: Option<PeerId>, message: &PeerMessage) {
        let Ok(text) = message.encode() else {
            return;
        };
        for (id, sender) in self.registry.peers.lock().iter() {
            if Some(*id) != except {
                let _ = sender.send(Message::Text(text.clone()));
            }
        }
    }

    /// Send a message to a single peer (e.g. a `tip` reply).
    pub fn send_to(&self, peer: PeerId, message: &PeerMessage) {
        let Ok(text) = message.encode() else {
            return;
        };
        if let Some(sender) = self.registry.peers.lock().get(&peer) {
            let _ = sender.send(Message::Text(text));
        }
    }

    /// Number of live peer connections.
    pub fn peer_count(&self) -> usize {
        self.registry.peers.lock().len()
    }

    /// The listener's bound address (useful when binding port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// Bind the listener, spawn dial tasks for the configured peers, and
/// return the broadcast handle plus the inbound event stream.
pub async fn start(
    config: NetworkConfig,
) -> Result<(GossipHandle, mpsc::UnboundedReceiver<NetworkEvent>), NetworkError> {
    let listener = TcpListener::bind(config.listen_socket())
        .await
        .map_err(|e| NetworkError::Bind(e.to_string()))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| NetworkError::Bind(e.to_string()))?;
    info!(%local_addr, "peer listener bound");

    let registry = Arc::new(Registry::new());
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    // Inbound connections.
    {
        let registry = Arc::clone(&registry);
        let event_tx = event_tx.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, remote)) => {
                        let registry = Arc::clone(&registry);
                        let event_tx = event_tx.clone();
                        tokio::spawn(async move {
                            match accept_async(stream).await {
                                Ok(ws) => run_connection(ws, registry, event_tx).await,
                                Err(e) => debug!(%remote, "websocket handshake failed: {e}"),
                            }
                        });
                    }
                    Err(e) => {
                        warn!("accept failed: {e}");
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                }
            }
        });
    }

    // Outbound peers: one dial task per distinct URL.
    let mut dialed = HashSet::new();
    for url in &config.peers {
        if !dialed.insert(url.clone()) {
            continue;
        }
        let url = url.clone();
        let registry = Arc::clone(&registry);
        let event_tx = event_tx.clone();
        tokio::spawn(dial_loop(url, registry, event_tx));
    }

    Ok((
        GossipHandle {
            registry,
            local_addr,
        },
        event_rx,
    ))
}

/// Dial one peer URL forever, reconnecting after [`RECONNECT_DELAY`].
async fn dial_loop(
    url: String,
    registry: Arc<Registry>,
    event_tx: mpsc::UnboundedSender<NetworkEvent>,
) {
    loop {
        match connect_async(url.as_str()).await {
            Ok((ws, _)) => {
                info!(%url, "connected to peer");
                run_connection(ws, Arc::clone(&registry), event_tx.clone()).await;
                warn!(%url, "peer connection lost, retrying");
            }
            Err(e) => debug!(%url, "dial failed: {e}"),
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

/// Drive one live connection until it closes.
///
/// Registers the peer, pumps outbound frames from the registry channel,
/// decodes inbound text frames into events, and deregisters on exit.
async fn run_connection<S>(
    ws: WebSocketStream<S>,
    registry: Arc<Registry>,
    event_tx: mpsc::UnboundedSender<NetworkEvent>,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let peer = registry.next_id.fetch_add(1, Ordering::Relaxed);
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
    registry.peers.lock().insert(peer, outbound_tx);
    let _ = event_tx.send(NetworkEvent::Connected { peer });

    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(frame) => {
                        if sink.send(frame).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => match PeerMessage::decode(&text) {
                        Some(message) => {
                            let _ = event_tx.send(NetworkEvent::Message { peer, message });
                        }
                        None => warn!(peer, "dropping malformed peer message"),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // ping/pong/binary: nothing to do
                    Some(Err(e)) => {
                        debug!(peer, "peer read error: {e}");
                        break;
                    }
                }
            }
        }
    }

    registry.peers.lock().remove(&peer);
    let _ = event_tx.send(NetworkEvent::Disconnected { peer });
}

#[cfg(test)]
mod tests {
    use super::*;
    use cobble_core::types::{Transaction, TxOutput};
    use std::time::Duration;
    use tokio::time::timeout;

    fn local_config(port: u16, peers: Vec<String>) -> NetworkConfig {
        NetworkConfig {
            listen_addr: "127.0.0.1".into(),
            listen_port: port,
            peers,
        }
    }

    fn sample_tx() -> Transaction {
        Transaction {
            id: "aa".into(),
            coinbase: true,
            inputs: vec![],
            outputs: vec![TxOutput {
                address: "bb".into(),
                amount: 50,
            }],
        }
    }

    async fn next_event(
        rx: &mut mpsc::UnboundedReceiver<NetworkEvent>,
    ) -> NetworkEvent {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for network event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn dial_connects_and_delivers_frames() {
        let (server, mut server_rx) = start(local_config(0, vec![])).await.unwrap();
        let url = format!("ws://{}", server.local_addr());

        let (client, mut client_rx) = start(local_config(0, vec![url])).await.unwrap();

        // Both sides observe the connection.
        assert!(matches!(next_event(&mut server_rx).await, NetworkEvent::Connected { .. }));
        assert!(matches!(next_event(&mut client_rx).await, NetworkEvent::Connected { .. }));
        assert_eq!(server.peer_count(), 1);
        assert_eq!(client.peer_count(), 1);

        // Client floods a transaction; the server receives it decoded.
        let msg = PeerMessage::Tx { tx: sample_tx() };
        client.broadcast(&msg);
        match next_event(&mut server_rx).await {
            NetworkEvent::Message { message, .. } => assert_eq!(message, msg),
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn broadcast_except_skips_the_origin() {
        let (server, mut server_rx) = start(local_config(0, vec![])).await.unwrap();
        let url = format!("ws://{}", server.local_addr());
        let (_client, mut client_rx) = start(local_config(0, vec![url])).await.unwrap();

        let origin = match next_event(&mut server_rx).await {
            NetworkEvent::Connected { peer } => peer,
            other => panic!("expected connect, got {other:?}"),
        };
        assert!(matches!(next_event(&mut client_rx).await, NetworkEvent::Connected { .. }));

        // Excluding the only peer means nothing is delivered.
        server.broadcast_except(Some(origin), &PeerMessage::GetTip);
        assert!(
            timeout(Duration::from_millis(300), client_rx.recv())
                .await
                .is_err()
        );

        // A plain broadcast does arrive.
        server.broadcast(&PeerMessage::GetTip);
        match next_event(&mut client_rx).await {
            NetworkEvent::Message { message, .. } => assert_eq!(message, PeerMessage::GetTip),
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_to_targets_one_peer() {
        let (server, mut server_rx) = start(local_config(0, vec![])).await.unwrap();
        let url = format!("ws://{}", server.local_addr());
        let (_client, mut client_rx) = start(local_config(0, vec![url])).await.unwrap();

        let peer = match next_event(&mut server_rx).await {
            NetworkEvent::Connected { peer } => peer,
            other => panic!("expected connect, got {other:?}"),
        };
        assert!(matches!(next_event(&mut client_rx).await, NetworkEvent::Connected { .. }));

        server.send_to(peer, &PeerMessage::Tip { tip: None });
        match next_event(&mut client_rx).await {
            NetworkEvent::Message { message, .. } => {
                assert_eq!(message, PeerMessage::Tip { tip: None });
            }
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn duplicate_peer_urls_dial_once() {
        let (server, mut server_rx) = start(local_config(0, vec![])).await.unwrap();
        let url = format!("ws://{}", server.local_addr());
        let (_client, _client_rx) =
            start(local_config(0, vec![url.clone(), url])).await.unwrap();

        assert!(matches!(next_event(&mut server_rx).await, NetworkEvent::Connected { .. }));
        // A second connection would surface here; give it a moment.
        assert!(
            timeout(Duration::from_millis(300), server_rx.recv())
                .await
                .is_err()
        );
        assert_eq!(server.peer_count(), 1);
    }
}

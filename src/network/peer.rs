//! Outbound peer connections and the peer registry.
//!
//! Each peer holds one long-lived WebSocket connection guarded by a mutex:
//! only one request is in flight at a time and additional senders queue in
//! FIFO order. The registry is append-only so that a peer's 1-based id stays
//! stable for the life of the process.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::protocol::{Request, Response, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One known peer and its outbound connection state.
pub struct Peer {
    host: String,
    port: u16,
    conn: Mutex<Option<WsStream>>,
}

impl Peer {
    pub fn new(host: &str, port: u16) -> Self {
        Peer {
            host: host.to_string(),
            port,
            conn: Mutex::new(None),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port` form used in peer listings.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Send one request and await its reply.
    ///
    /// The connection is established lazily and dropped on any transport
    /// error, so the next send reconnects.
    pub async fn send(&self, request: &Request) -> Result<Response, TransportError> {
        let mut conn = self.conn.lock().await;

        if conn.is_none() {
            let addr = format!("ws://{}:{}/", self.host, self.port);
            let (stream, _) = connect_async(&addr)
                .await
                .map_err(|e| TransportError::Connect {
                    addr: addr.clone(),
                    reason: e.to_string(),
                })?;
            *conn = Some(stream);
        }

        let ws = conn.as_mut().expect("connection established above");

        if let Err(e) = ws.send(Message::Text(request.encode().into())).await {
            *conn = None;
            return Err(TransportError::Send(e.to_string()));
        }

        loop {
            match ws.next().await {
                Some(Ok(Message::Text(frame))) => return Response::decode(frame.as_ref()),
                Some(Ok(Message::Close(_))) | None => {
                    *conn = None;
                    return Err(TransportError::Closed);
                }
                Some(Ok(_)) => continue, // ping/pong/binary: not a reply
                Some(Err(e)) => {
                    *conn = None;
                    return Err(TransportError::Recv(e.to_string()));
                }
            }
        }
    }
}

/// Append-only registry of peers with stable 1-based ids.
#[derive(Default)]
pub struct PeerRegistry {
    peers: std::sync::RwLock<Vec<std::sync::Arc<Peer>>>,
}

impl PeerRegistry {
    /// Register a peer, returning its id.
    pub fn add(&self, host: &str, port: u16) -> usize {
        let mut peers = self.peers.write().expect("peer registry poisoned");
        peers.push(std::sync::Arc::new(Peer::new(host, port)));
        peers.len()
    }

    /// Find a peer's id by endpoint.
    pub fn find(&self, host: &str, port: u16) -> Option<usize> {
        let peers = self.peers.read().expect("peer registry poisoned");
        peers
            .iter()
            .position(|peer| peer.host() == host && peer.port() == port)
            .map(|pos| pos + 1)
    }

    /// Find a peer's id, registering it first if unknown.
    pub fn find_or_add(&self, host: &str, port: u16) -> usize {
        match self.find(host, port) {
            Some(peer_id) => peer_id,
            None => self.add(host, port),
        }
    }

    pub fn get(&self, peer_id: usize) -> Option<std::sync::Arc<Peer>> {
        let peers = self.peers.read().expect("peer registry poisoned");
        peers.get(peer_id.checked_sub(1)?).cloned()
    }

    /// All peers with their ids.
    pub fn all(&self) -> Vec<(usize, std::sync::Arc<Peer>)> {
        let peers = self.peers.read().expect("peer registry poisoned");
        peers
            .iter()
            .enumerate()
            .map(|(pos, peer)| (pos + 1, peer.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.peers.read().expect("peer registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `host:port` listings for the admin surface.
    pub fn endpoints(&self) -> Vec<String> {
        let peers = self.peers.read().expect("peer registry poisoned");
        peers.iter().map(|peer| peer.endpoint()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_stable_and_one_based() {
        let registry = PeerRegistry::default();
        assert!(registry.is_empty());
        assert_eq!(registry.add("10.0.0.1", 8332), 1);
        assert_eq!(registry.add("10.0.0.2", 8332), 2);
        assert_eq!(registry.find("10.0.0.1", 8332), Some(1));
        assert_eq!(registry.find("10.0.0.3", 8332), None);
        assert_eq!(registry.find_or_add("10.0.0.3", 8332), 3);
        assert_eq!(registry.find_or_add("10.0.0.1", 8332), 1);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn endpoints_listing() {
        let registry = PeerRegistry::default();
        registry.add("a", 1);
        registry.add("b", 2);
        assert_eq!(registry.endpoints(), vec!["a:1", "b:2"]);
        assert_eq!(registry.get(2).unwrap().endpoint(), "b:2");
        assert!(registry.get(0).is_none());
        assert!(registry.get(3).is_none());
    }
}

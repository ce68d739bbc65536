//! Peer-to-peer messaging: wire envelopes, outbound peer connections, and
//! the inbound gossip server.

pub mod peer;
pub mod protocol;
pub mod server;

pub use peer::{Peer, PeerRegistry};
pub use protocol::{Request, Response, Status, TransportError};

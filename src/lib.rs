//! # Cinder
//!
//! A minimal peer-to-peer cryptocurrency node:
//! - **Append-only block chain** — SHA-256 linked blocks carrying either an
//!   opaque string payload or a UTXO transaction list
//! - **Optional proof-of-work** — leading-zero-bit hash targets with a
//!   windowed difficulty controller; the longest / most-work chain wins
//! - **UTXO transactions** — secp256k1-signed value transfers with a FIFO
//!   mempool
//! - **Gossip networking** — WebSocket peer messages for block and
//!   transaction propagation with pull-based chain reconciliation
//! - **Admin HTTP API** — JSON endpoints for inspecting and driving a node

pub mod block;
pub mod chain;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod difficulty;
pub mod mempool;
pub mod network;
pub mod node;
pub mod transaction;
pub mod utxo;

/// Protocol constants
pub mod constants {
    /// Default WebSocket (gossip) listen port
    pub const DEFAULT_WEBSOCKET_PORT: u16 = 8332;
    /// Default admin HTTP listen port
    pub const DEFAULT_HTTP_PORT: u16 = 8333;
    /// Maximum peer message size in bytes (16 MiB)
    pub const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;
    /// Server-side timeout for admin requests in seconds
    pub const ADMIN_REQUEST_TIMEOUT_SECS: u64 = 30;
    /// Maximum admin request body size (2 MiB)
    pub const MAX_ADMIN_BODY_BYTES: usize = 2 * 1024 * 1024;
}

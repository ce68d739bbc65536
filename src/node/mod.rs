//! Node orchestrator tying together the chain, mempool, peer registry, and
//! the two server surfaces.
//!
//! The `Node` value is a cheaply cloneable handle. Chain, UTXO set, and
//! mempool live in one `NodeState` behind a single lock; gossip handlers and
//! admin handlers mutate it synchronously and schedule outbound sends on a
//! task tracker that `run` drains on shutdown.

pub mod rpc;

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::block::{Block, BlockData};
use crate::chain::{Blockchain, ChainError};
use crate::clock;
use crate::config::ChainConfig;
use crate::constants;
use crate::mempool::{Mempool, MempoolError};
use crate::network::protocol::{targets, Request};
use crate::network::server::{self, Dispatcher};
use crate::network::PeerRegistry;
use crate::transaction::{Transaction, TransactionList};

/// Errors surfaced by node operations, mapped to HTTP statuses by the admin
/// surface and to `"not ok"` envelopes by the gossip surface.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("blockchain is empty")]
    EmptyChain,
    #[error("malformed request: {0}")]
    BadRequest(String),
    #[error("unknown target '{0}'")]
    UnknownTarget(String),
    #[error("transactions are not enabled on this node")]
    TransactionsDisabled,
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Mempool(#[from] MempoolError),
}

/// Runtime configuration of one node instance.
#[derive(Clone, Debug)]
pub struct NodeConfig {
    pub name: String,
    pub websocket_host: String,
    pub websocket_port: u16,
    pub http_host: String,
    pub http_port: u16,
    pub chain: ChainConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            name: "cinder".into(),
            websocket_host: "127.0.0.1".into(),
            websocket_port: constants::DEFAULT_WEBSOCKET_PORT,
            http_host: "127.0.0.1".into(),
            http_port: constants::DEFAULT_HTTP_PORT,
            chain: ChainConfig::default(),
        }
    }
}

/// Mutable node state under the single logical lock.
pub struct NodeState {
    pub chain: Blockchain,
    pub mempool: Mempool,
}

struct NodeInner {
    config: NodeConfig,
    state: RwLock<NodeState>,
    peers: PeerRegistry,
    shutdown: CancellationToken,
    outbound: TaskTracker,
}

/// Handle to a running (or startable) node.
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

impl Node {
    /// Create a node, optionally seeded with a previously dumped chain.
    pub fn new(config: NodeConfig, initial_chain: Option<Blockchain>) -> Self {
        let chain = initial_chain.unwrap_or_else(|| Blockchain::new(config.chain.clone()));
        Node {
            inner: Arc::new(NodeInner {
                config,
                state: RwLock::new(NodeState {
                    chain,
                    mempool: Mempool::default(),
                }),
                peers: PeerRegistry::default(),
                shutdown: CancellationToken::new(),
                outbound: TaskTracker::new(),
            }),
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.inner.config
    }

    /// Run both server loops until [`Node::stop`] is called, then drain
    /// outstanding outbound sends.
    pub async fn run(&self) -> std::io::Result<()> {
        let ws_addr = format!(
            "{}:{}",
            self.inner.config.websocket_host, self.inner.config.websocket_port
        );
        let http_addr = format!(
            "{}:{}",
            self.inner.config.http_host, self.inner.config.http_port
        );

        let ws_listener = TcpListener::bind(&ws_addr).await?;
        let http_listener = TcpListener::bind(&http_addr).await?;

        tracing::info!(
            name = %self.inner.config.name,
            websocket = %ws_addr,
            http = %http_addr,
            "Running node"
        );

        let gossip = tokio::spawn(server::serve(
            ws_listener,
            self.dispatcher(),
            self.inner.shutdown.clone(),
        ));

        let admin_app = rpc::router(self.clone());
        let shutdown = self.inner.shutdown.clone();
        let admin = tokio::spawn(async move {
            axum::serve(http_listener, admin_app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
        });

        let _ = gossip.await;
        if let Ok(Err(e)) = admin.await {
            tracing::error!(error = %e, "Admin server failed");
        }

        self.inner.outbound.close();
        self.inner.outbound.wait().await;
        tracing::info!("Node stopped");
        Ok(())
    }

    /// Request shutdown. Idempotent.
    pub fn stop(&self) {
        tracing::info!(name = %self.inner.config.name, "Stopping node");
        self.inner.shutdown.cancel();
    }

    /// The self-reported gossip origin. A NATed peer may observe a
    /// different address.
    fn origin(&self) -> Value {
        json!({
            "host": self.inner.config.websocket_host,
            "port": self.inner.config.websocket_port,
        })
    }

    fn transaction_config(&self) -> Result<&crate::config::TransactionConfig, NodeError> {
        self.inner
            .config
            .chain
            .transaction
            .as_ref()
            .ok_or(NodeError::TransactionsDisabled)
    }

    // ── Gossip dispatch ──

    fn dispatcher(&self) -> Dispatcher {
        let node = self.clone();
        Arc::new(move |request: Request| {
            let node = node.clone();
            Box::pin(async move { node.dispatch(request).await.map_err(|e| e.to_string()) })
        })
    }

    /// Route one inbound peer request to its handler.
    pub async fn dispatch(&self, request: Request) -> Result<Value, NodeError> {
        match request.target.as_str() {
            targets::REQUEST_LATEST_BLOCK => self.handle_request_latest_block().await,
            targets::REQUEST_ALL_BLOCKS => self.handle_request_all_blocks().await,
            targets::RECEIVE_LATEST_BLOCK => {
                self.handle_receive_latest_block(request.data).await?;
                Ok(Value::Null)
            }
            targets::RECEIVE_ALL_BLOCKS => {
                self.handle_receive_all_blocks(request.data).await?;
                Ok(Value::Null)
            }
            targets::RECEIVE_TRANSACTION => {
                self.handle_receive_transaction(request.data).await?;
                Ok(Value::Null)
            }
            other => Err(NodeError::UnknownTarget(other.to_string())),
        }
    }

    async fn handle_request_latest_block(&self) -> Result<Value, NodeError> {
        let state = self.inner.state.read().await;
        let block = state.chain.latest_block().ok_or(NodeError::EmptyChain)?;
        Ok(json!({"block": block, "origin": self.origin()}))
    }

    async fn handle_request_all_blocks(&self) -> Result<Value, NodeError> {
        let state = self.inner.state.read().await;
        Ok(json!({"blockchain": state.chain.to_json(), "origin": self.origin()}))
    }

    /// A peer pushed (or we pulled) its latest block.
    ///
    /// Ahead of us: remember the origin and pull its whole chain. Exactly
    /// next: append if it extends our chain. Behind us: drop. Inbound
    /// receives never rebroadcast; only the admin append path does.
    pub async fn handle_receive_latest_block(&self, data: Value) -> Result<(), NodeError> {
        let block: Block = serde_json::from_value(
            data.get("block")
                .cloned()
                .ok_or_else(|| NodeError::BadRequest("missing 'block'".into()))?,
        )
        .map_err(|e| NodeError::BadRequest(format!("bad block: {e}")))?;

        // Context-free checks up front. Payload validity needs the ledger
        // snapshot at the block's height, which we only have when the block
        // is the immediate next one; the append below covers that case.
        if block.hash != block.compute_hash() {
            return Err(NodeError::BadRequest("invalid block: hash mismatch".into()));
        }
        let max_delta = self.inner.config.chain.block_gen.time_max_delta;
        if block.timestamp > clock::now().saturating_add(max_delta) {
            return Err(NodeError::BadRequest("invalid block: timestamp".into()));
        }

        let mut state = self.inner.state.write().await;
        let local_len = state.chain.len() as u64;

        if block.index > local_len {
            // We are behind; resolve via a full pull from the origin.
            drop(state);
            let (host, port) = parse_origin(&data)?;
            let peer_id = self.inner.peers.find_or_add(&host, port);
            tracing::info!(host = %host, port, peer_id, "Peer is ahead, requesting all blocks");
            self.spawn_request_all_blocks(peer_id);
        } else if block.index == local_len {
            match state.chain.append_next_block(block) {
                Ok(()) => {
                    tracing::info!(index = local_len, "Appending received block");
                    let NodeState { chain, mempool } = &mut *state;
                    mempool.prune(chain.utxos());
                }
                Err(ChainError::NotSuccessor(_)) | Err(ChainError::InvalidGenesis(_)) => {
                    tracing::info!("Ignoring block (not a valid successor)");
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            tracing::debug!(index = block.index, "Ignoring block (stale)");
        }

        Ok(())
    }

    /// A peer pushed (or we pulled) its whole chain: validate, and replace
    /// ours iff the received chain is strictly richer.
    pub async fn handle_receive_all_blocks(&self, data: Value) -> Result<(), NodeError> {
        let value = data
            .get("blockchain")
            .cloned()
            .ok_or_else(|| NodeError::BadRequest("missing 'blockchain'".into()))?;

        let candidate = Blockchain::from_json(self.inner.config.chain.clone(), &value)
            .map_err(|e| NodeError::BadRequest(format!("invalid blockchain: {e}")))?;

        let mut state = self.inner.state.write().await;
        if candidate.is_richer_than(&state.chain) {
            state.chain.replace(candidate);
            let NodeState { chain, mempool } = &mut *state;
            let pruned = mempool.prune(chain.utxos());
            tracing::info!(pruned, "Adopted peer blockchain");
        } else {
            tracing::debug!("Keeping local blockchain");
        }
        Ok(())
    }

    /// A peer pushed a transaction: pool it unless already known.
    pub async fn handle_receive_transaction(&self, data: Value) -> Result<(), NodeError> {
        let tx_config = self.transaction_config()?.clone();
        let tx: Transaction = serde_json::from_value(data)
            .map_err(|e| NodeError::BadRequest(format!("bad transaction: {e}")))?;

        let mut state = self.inner.state.write().await;
        if state.mempool.contains(&tx.hash) {
            tracing::debug!(hash = %tx.hash, "Ignoring duplicate transaction");
            return Ok(());
        }
        let NodeState { chain, mempool } = &mut *state;
        mempool.add(tx, chain.utxos(), &tx_config)?;
        Ok(())
    }

    // ── Outbound drivers ──

    /// Best-effort push of our latest block to every peer. Per-peer failures
    /// are logged and do not block the caller; recovery happens through the
    /// pull paths.
    pub async fn broadcast_latest_block(&self) {
        let payload = {
            let state = self.inner.state.read().await;
            let Some(block) = state.chain.latest_block() else {
                return;
            };
            json!({"block": block, "origin": self.origin()})
        };
        let request = Request::new(targets::RECEIVE_LATEST_BLOCK, payload);

        tracing::info!("Broadcasting latest block");
        self.broadcast(request);
    }

    /// Best-effort push of a transaction to every peer.
    pub async fn broadcast_transaction(&self, tx: &Transaction) {
        let request = Request::new(
            targets::RECEIVE_TRANSACTION,
            serde_json::to_value(tx).expect("transaction serialization cannot fail"),
        );
        tracing::info!(hash = %tx.hash, "Broadcasting transaction");
        self.broadcast(request);
    }

    fn broadcast(&self, request: Request) {
        for (peer_id, peer) in self.inner.peers.all() {
            let request = request.clone();
            self.inner.outbound.spawn(async move {
                match peer.send(&request).await {
                    Ok(reply) => {
                        if let Err(e) = reply.into_result() {
                            tracing::warn!(peer_id, error = %e, "Peer rejected broadcast");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(peer_id, error = %e, "Broadcast failed");
                    }
                }
            });
        }
    }

    /// Pull a peer's latest block in the background and feed it through the
    /// receive path.
    pub fn spawn_request_latest_block(&self, peer_id: usize) {
        let node = self.clone();
        self.inner.outbound.spawn(async move {
            tracing::info!(peer_id, "Requesting latest block");
            let Some(peer) = node.inner.peers.get(peer_id) else {
                return;
            };
            let request = Request::new(targets::REQUEST_LATEST_BLOCK, Value::Null);
            match peer.send(&request).await.map(|r| r.into_result()) {
                Ok(Ok(data)) => {
                    if let Err(e) = node.handle_receive_latest_block(data).await {
                        tracing::debug!(peer_id, error = %e, "Pulled block not applied");
                    }
                }
                Ok(Err(e)) | Err(e) => {
                    tracing::error!(peer_id, error = %e, "Requesting latest block failed");
                }
            }
        });
    }

    /// Pull a peer's whole chain in the background and feed it through the
    /// receive path.
    pub fn spawn_request_all_blocks(&self, peer_id: usize) {
        let node = self.clone();
        self.inner.outbound.spawn(async move {
            tracing::info!(peer_id, "Requesting all blocks");
            let Some(peer) = node.inner.peers.get(peer_id) else {
                return;
            };
            let request = Request::new(targets::REQUEST_ALL_BLOCKS, Value::Null);
            match peer.send(&request).await.map(|r| r.into_result()) {
                Ok(Ok(data)) => {
                    if let Err(e) = node.handle_receive_all_blocks(data).await {
                        tracing::debug!(peer_id, error = %e, "Pulled chain not adopted");
                    }
                }
                Ok(Err(e)) | Err(e) => {
                    tracing::error!(peer_id, error = %e, "Requesting all blocks failed");
                }
            }
        });
    }

    // ── Admin operations ──

    /// Full chain as a JSON array.
    pub async fn blocks(&self) -> Value {
        self.inner.state.read().await.chain.to_json()
    }

    /// Latest block, or `null` on an empty chain.
    pub async fn latest_block(&self) -> Value {
        let state = self.inner.state.read().await;
        match state.chain.latest_block() {
            Some(block) => serde_json::to_value(block).expect("block serialization cannot fail"),
            None => Value::Null,
        }
    }

    /// Construct, seal, and commit the next block, then broadcast it.
    ///
    /// On a plain chain the body is the block's string payload; on a
    /// transaction chain it is the reward address, and the block carries the
    /// reward plus pending transactions drained from the mempool.
    pub async fn add_block(&self, body: Value) -> Result<(), NodeError> {
        let text = body
            .as_str()
            .ok_or_else(|| NodeError::BadRequest("expected a JSON string body".into()))?
            .to_string();

        {
            let mut state = self.inner.state.write().await;

            if let Some(tx_config) = self.inner.config.chain.transaction.clone() {
                let next_index = state.chain.len() as u64;
                let reward = Transaction::reward(next_index, &text, tx_config.reward_amount);

                let pending: Vec<Transaction> = state
                    .mempool
                    .iter()
                    .take(tx_config.num_per_block)
                    .cloned()
                    .collect();

                let mut entries = vec![reward];
                entries.extend(pending.iter().cloned());
                let data = BlockData::Transactions(TransactionList(entries));

                // Mining can spin for a while; keep the runtime responsive.
                tokio::task::block_in_place(|| {
                    state.chain.construct_next_block(data).map(|_| ())
                })?;

                for tx in &pending {
                    state.mempool.remove(&tx.hash);
                }
                let NodeState { chain, mempool } = &mut *state;
                mempool.prune(chain.utxos());
            } else {
                let data = BlockData::Raw(text);
                tokio::task::block_in_place(|| {
                    state.chain.construct_next_block(data).map(|_| ())
                })?;
            }
        }

        self.broadcast_latest_block().await;
        Ok(())
    }

    /// Registered peer endpoints.
    pub fn peers(&self) -> Vec<String> {
        self.inner.peers.endpoints()
    }

    /// Register a peer, then pull its latest block in the background.
    pub fn add_peer(&self, host: &str, port: u16) -> usize {
        let peer_id = self.inner.peers.find_or_add(host, port);
        tracing::info!(host, port, peer_id, "Registered peer");
        self.spawn_request_latest_block(peer_id);
        peer_id
    }

    /// Pending transactions in arrival order.
    pub async fn transactions_unconfirmed(&self) -> Result<Value, NodeError> {
        self.transaction_config()?;
        let state = self.inner.state.read().await;
        let pending: Vec<&Transaction> = state.mempool.iter().collect();
        Ok(serde_json::to_value(pending).expect("transaction serialization cannot fail"))
    }

    /// The unspent-output ledger.
    pub async fn transactions_unspent(&self) -> Result<Value, NodeError> {
        self.transaction_config()?;
        let state = self.inner.state.read().await;
        Ok(serde_json::to_value(state.chain.utxos().to_list())
            .expect("utxo serialization cannot fail"))
    }

    /// The most recently accepted transaction: mempool tail, else the last
    /// transaction of the latest block, else `null`.
    pub async fn transactions_latest(&self) -> Result<Value, NodeError> {
        self.transaction_config()?;
        let state = self.inner.state.read().await;
        let latest = state.mempool.latest().or_else(|| {
            state
                .chain
                .latest_block()
                .and_then(|block| block.data.transactions())
                .and_then(|list| list.0.last())
        });
        Ok(match latest {
            Some(tx) => serde_json::to_value(tx).expect("transaction serialization cannot fail"),
            None => Value::Null,
        })
    }

    /// Accept a wallet-submitted transaction into the mempool and push it to
    /// peers. Re-submitting a pooled transaction is a no-op.
    pub async fn add_transaction(&self, body: Value) -> Result<(), NodeError> {
        let tx_config = self.transaction_config()?.clone();
        let tx: Transaction = serde_json::from_value(body)
            .map_err(|e| NodeError::BadRequest(format!("bad transaction: {e}")))?;

        {
            let mut state = self.inner.state.write().await;
            if state.mempool.contains(&tx.hash) {
                return Ok(());
            }
            let NodeState { chain, mempool } = &mut *state;
            mempool.add(tx.clone(), chain.utxos(), &tx_config)?;
        }

        self.broadcast_transaction(&tx).await;
        Ok(())
    }
}

fn parse_origin(data: &Value) -> Result<(String, u16), NodeError> {
    let origin = data
        .get("origin")
        .ok_or_else(|| NodeError::BadRequest("missing 'origin'".into()))?;
    let host = origin
        .get("host")
        .and_then(Value::as_str)
        .ok_or_else(|| NodeError::BadRequest("missing origin host".into()))?;
    let port = origin
        .get("port")
        .and_then(Value::as_u64)
        .and_then(|p| u16::try_from(p).ok())
        .ok_or_else(|| NodeError::BadRequest("missing origin port".into()))?;
    Ok((host.to_string(), port))
}

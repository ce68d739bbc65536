//! JSON HTTP admin API for the Cinder node.
//!
//! Provides endpoints for inspecting the chain, driving block construction,
//! managing peers, and (on transaction chains) submitting transactions.
//! Malformed bodies map to 400, wrong content types to 415, unknown paths to
//! 404; requests are cut off server-side after 30 seconds, with any side
//! effects already committed left in place.

use std::time::Duration;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::Value;
use tower_http::timeout::TimeoutLayer;

use super::{Node, NodeError};
use crate::constants;

impl NodeError {
    fn status(&self) -> StatusCode {
        match self {
            NodeError::UnknownTarget(_) => StatusCode::NOT_FOUND,
            NodeError::EmptyChain => StatusCode::INTERNAL_SERVER_ERROR,
            NodeError::BadRequest(_)
            | NodeError::TransactionsDisabled
            | NodeError::Chain(_)
            | NodeError::Mempool(_) => StatusCode::BAD_REQUEST,
        }
    }
}

fn reject(e: NodeError) -> (StatusCode, String) {
    tracing::debug!(error = %e, "Admin request rejected");
    (e.status(), e.to_string())
}

/// Build the admin router. Transaction endpoints exist only on transaction
/// chains.
pub fn router(node: Node) -> Router {
    let mut router = Router::new()
        .route("/blocks", get(list_blocks).post(add_block))
        .route("/blocks/latest", get(latest_block))
        .route("/peers", get(list_peers).post(add_peer));

    if node.config().chain.transactions_enabled() {
        router = router
            .route("/transactions", post(add_transaction))
            .route("/transactions/unconfirmed", get(unconfirmed_transactions))
            .route("/transactions/unspent", get(unspent_outputs))
            .route("/transactions/latest", get(latest_transaction));
    }

    router
        .with_state(node)
        .layer(TimeoutLayer::new(Duration::from_secs(
            constants::ADMIN_REQUEST_TIMEOUT_SECS,
        )))
        .layer(DefaultBodyLimit::max(constants::MAX_ADMIN_BODY_BYTES))
}

// ── GET /blocks ──

async fn list_blocks(State(node): State<Node>) -> Json<Value> {
    Json(node.blocks().await)
}

// ── GET /blocks/latest ──

async fn latest_block(State(node): State<Node>) -> Json<Value> {
    Json(node.latest_block().await)
}

// ── POST /blocks ──

async fn add_block(
    State(node): State<Node>,
    Json(body): Json<Value>,
) -> Result<StatusCode, (StatusCode, String)> {
    tracing::info!("Running 'add block' handler");
    node.add_block(body).await.map_err(reject)?;
    Ok(StatusCode::OK)
}

// ── GET /peers ──

async fn list_peers(State(node): State<Node>) -> Json<Vec<String>> {
    Json(node.peers())
}

// ── POST /peers ──

#[derive(Deserialize)]
struct AddPeerRequest {
    host: String,
    port: u16,
}

async fn add_peer(
    State(node): State<Node>,
    Json(request): Json<AddPeerRequest>,
) -> StatusCode {
    tracing::info!("Running 'add peer' handler");
    node.add_peer(&request.host, request.port);
    StatusCode::OK
}

// ── GET /transactions/unconfirmed ──

async fn unconfirmed_transactions(
    State(node): State<Node>,
) -> Result<Json<Value>, (StatusCode, String)> {
    node.transactions_unconfirmed().await.map(Json).map_err(reject)
}

// ── GET /transactions/unspent ──

async fn unspent_outputs(State(node): State<Node>) -> Result<Json<Value>, (StatusCode, String)> {
    node.transactions_unspent().await.map(Json).map_err(reject)
}

// ── GET /transactions/latest ──

async fn latest_transaction(
    State(node): State<Node>,
) -> Result<Json<Value>, (StatusCode, String)> {
    node.transactions_latest().await.map(Json).map_err(reject)
}

// ── POST /transactions ──

async fn add_transaction(
    State(node): State<Node>,
    Json(body): Json<Value>,
) -> Result<StatusCode, (StatusCode, String)> {
    tracing::info!("Running 'add transaction' handler");
    node.add_transaction(body).await.map_err(reject)?;
    Ok(StatusCode::OK)
}

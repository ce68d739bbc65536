//! Wire protocol envelopes for peer gossip.
//!
//! Every peer exchange is a single WebSocket text frame carrying JSON: a
//! request `{target, data}` answered by a response `{status, data}`. A
//! `status` of `"ok"` means `data` is the handler's return value; otherwise
//! `data` is a human-readable error string.

use serde::{Deserialize, Serialize};

/// Gossip request targets.
pub mod targets {
    pub const REQUEST_LATEST_BLOCK: &str = "/request-latest-block";
    pub const REQUEST_ALL_BLOCKS: &str = "/request-all-blocks";
    pub const RECEIVE_LATEST_BLOCK: &str = "/receive-latest-block";
    pub const RECEIVE_ALL_BLOCKS: &str = "/receive-all-blocks";
    pub const RECEIVE_TRANSACTION: &str = "/receive-transaction";
}

/// Errors from the peer transport.
#[derive(Clone, Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },
    #[error("failed to send request: {0}")]
    Send(String),
    #[error("failed to receive reply: {0}")]
    Recv(String),
    #[error("connection closed before a reply arrived")]
    Closed,
    #[error("malformed message envelope: {0}")]
    Malformed(String),
    #[error("peer rejected request: {0}")]
    Rejected(String),
}

/// A request frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub target: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Request {
    pub fn new(target: &str, data: serde_json::Value) -> Self {
        Request {
            target: target.to_string(),
            data,
        }
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).expect("request serialization cannot fail")
    }

    pub fn decode(frame: &str) -> Result<Self, TransportError> {
        serde_json::from_str(frame).map_err(|e| TransportError::Malformed(e.to_string()))
    }
}

/// Response status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "not ok")]
    NotOk,
}

/// A response frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Response {
    pub fn ok(data: serde_json::Value) -> Self {
        Response {
            status: Status::Ok,
            data,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response {
            status: Status::NotOk,
            data: serde_json::Value::String(message.into()),
        }
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).expect("response serialization cannot fail")
    }

    pub fn decode(frame: &str) -> Result<Self, TransportError> {
        serde_json::from_str(frame).map_err(|e| TransportError::Malformed(e.to_string()))
    }

    /// Unwrap the payload of an `"ok"` response, or the error string of a
    /// `"not ok"` one.
    pub fn into_result(self) -> Result<serde_json::Value, TransportError> {
        match self.status {
            Status::Ok => Ok(self.data),
            Status::NotOk => Err(TransportError::Rejected(
                self.data.as_str().unwrap_or("unknown error").to_string(),
            )),
        }
    }
}

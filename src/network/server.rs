//! Inbound gossip server: a WebSocket accept loop dispatching request
//! envelopes to the node.
//!
//! Handling is serialized per connection (frames are answered in arrival
//! order) but not across connections, which each run on their own task.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::protocol::{Request, Response};
use crate::constants::MAX_MESSAGE_BYTES;

/// Handler invoked for every inbound request frame. Returns the payload of
/// an `"ok"` response, or the error string of a `"not ok"` one.
pub type Dispatcher =
    Arc<dyn Fn(Request) -> BoxFuture<'static, Result<serde_json::Value, String>> + Send + Sync>;

/// Accept connections until `shutdown` fires, spawning one task per
/// connection.
pub async fn serve(listener: TcpListener, dispatcher: Dispatcher, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::debug!("Gossip server shutting down");
                return;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        let dispatcher = dispatcher.clone();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            handle_connection(stream, dispatcher, shutdown).await;
                            tracing::debug!(peer = %addr, "Gossip connection closed");
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to accept gossip connection");
                    }
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    dispatcher: Dispatcher,
    shutdown: CancellationToken,
) {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(MAX_MESSAGE_BYTES);
    config.max_frame_size = Some(MAX_MESSAGE_BYTES);

    let ws = match tokio_tungstenite::accept_async_with_config(stream, Some(config)).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::warn!(error = %e, "WebSocket handshake failed");
            return;
        }
    };

    let (mut sink, mut frames) = ws.split();

    loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                return;
            }
            frame = frames.next() => frame,
        };

        let response = match frame {
            Some(Ok(Message::Text(text))) => match Request::decode(text.as_ref()) {
                Ok(request) => {
                    tracing::debug!(target = %request.target, "Handling peer request");
                    match dispatcher(request).await {
                        Ok(data) => Response::ok(data),
                        Err(message) => Response::error(message),
                    }
                }
                Err(e) => Response::error(format!("malformed request: {e}")),
            },
            Some(Ok(Message::Binary(_))) => Response::error("expected a text frame"),
            Some(Ok(Message::Close(_))) | None => return,
            Some(Ok(_)) => continue, // ping/pong
            Some(Err(e)) => {
                tracing::debug!(error = %e, "Gossip read failed");
                return;
            }
        };

        if let Err(e) = sink.send(Message::Text(response.encode().into())).await {
            tracing::debug!(error = %e, "Gossip write failed");
            return;
        }
    }
}

//! One connected client, from upgrade through disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use relay_rpc::{MethodRegistry, RpcContext, RpcEvent};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::broadcast::BroadcastManager;
use super::connection::{ClientConnection, Frame};
use super::handler::handle_message;

/// Outbound queue depth per client.
pub const SEND_QUEUE: usize = 1024;

/// How long the write task gets to flush a Close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Ping cadence for a client.
#[derive(Clone, Copy, Debug)]
pub struct Heartbeat {
    /// Interval between server pings.
    pub interval: Duration,
    /// Disconnect when the client has been silent this long.
    pub timeout: Duration,
}

/// Shared pieces a client session needs.
#[derive(Clone)]
pub struct SessionDeps {
    /// RPC method registry.
    pub registry: Arc<MethodRegistry>,
    /// Handler context.
    pub ctx: Arc<RpcContext>,
    /// Event fan-out.
    pub broadcast: Arc<BroadcastManager>,
    /// Ping cadence.
    pub heartbeat: Heartbeat,
    /// Server shutdown signal.
    pub shutdown: CancellationToken,
}

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the client for event fan-out
/// 2. Sends `connection.established` with the client id
/// 3. Dispatches inbound text frames as RPC requests, one at a time
/// 4. Forwards responses and events, pinging on the heartbeat interval
/// 5. Closes on client close, missed heartbeat, or server shutdown
#[instrument(skip_all, fields(client_id = %client_id))]
pub async fn run_ws_session(ws: WebSocket, client_id: String, deps: SessionDeps) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Frame>(SEND_QUEUE);
    let connection = Arc::new(ClientConnection::new(client_id.clone(), send_tx));
    deps.broadcast.attach(Arc::clone(&connection));
    info!(client_id, "client connected");

    let established = RpcEvent::new("connection.established", Some(json!({ "clientId": client_id })));
    if let Ok(text) = serde_json::to_string(&established) {
        let _ = ws_tx.send(Message::Text(text.into())).await;
    }

    let closed = deps.shutdown.child_token();
    let heartbeat = deps.heartbeat;
    let outbound_conn = Arc::clone(&connection);
    let outbound_closed = closed.clone();
    let mut outbound = tokio::spawn(async move {
        let mut ping = tokio::time::interval(heartbeat.interval);
        let _ = ping.tick().await;

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    let Some(text) = msg else { break };
                    if ws_tx.send(Message::Text(text.to_string().into())).await.is_err() {
                        break;
                    }
                }
                _ = ping.tick() => {
                    if outbound_conn.silent_for() > heartbeat.timeout {
                        warn!(timeout = ?heartbeat.timeout, "client unresponsive, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
                () = outbound_closed.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
        outbound_closed.cancel();
    });

    loop {
        let frame = tokio::select! {
            frame = ws_rx.next() => frame,
            () = closed.cancelled() => break,
        };
        let Some(Ok(frame)) = frame else { break };
        connection.touch();

        let text = match frame {
            Message::Text(t) => t.as_str().to_owned(),
            Message::Binary(data) => match std::str::from_utf8(&data) {
                Ok(s) => s.to_owned(),
                Err(_) => {
                    debug!(len = data.len(), "ignoring non-UTF8 binary frame");
                    continue;
                }
            },
            Message::Close(_) => {
                info!(client_id, "client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        let reply = handle_message(&text, &deps.registry, &deps.ctx).await;
        let Some(frame) = reply.encode() else { continue };
        if !connection.send(frame.into()) {
            warn!(client_id, method = reply.method.as_deref(), "response dropped, client queue full");
        }
    }

    closed.cancel();
    if tokio::time::timeout(CLOSE_GRACE, &mut outbound).await.is_err() {
        outbound.abort();
    }
    deps.broadcast.detach(&client_id);
    info!(
        client_id,
        dropped = connection.drop_count(),
        duration_secs = connection.age().as_secs(),
        "client disconnected"
    );
}

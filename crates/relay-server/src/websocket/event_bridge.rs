//! Event bridge: converts [`SessionEvent`]s into [`RpcEvent`]s and fans
//! them out through the [`BroadcastManager`].

use std::sync::Arc;

use relay_rpc::RpcEvent;
use relay_session::SessionEvent;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::broadcast::BroadcastManager;

/// Bridges session events to WebSocket clients.
pub struct EventBridge {
    rx: broadcast::Receiver<SessionEvent>,
    broadcast: Arc<BroadcastManager>,
}

impl EventBridge {
    /// Create a new event bridge.
    pub fn new(rx: broadcast::Receiver<SessionEvent>, broadcast: Arc<BroadcastManager>) -> Self {
        Self { rx, broadcast }
    }

    /// Run until the emitter closes or `cancel` fires.
    #[tracing::instrument(skip_all, name = "event_bridge")]
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            let received = tokio::select! {
                received = self.rx.recv() => received,
                () = cancel.cancelled() => break,
            };
            match received {
                Ok(event) => {
                    debug!(event_type = event.event_type(), "bridging event to clients");
                    let _ = self.broadcast.publish(&session_event_to_rpc(&event));
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(lagged = n, "event bridge lagged, events skipped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("event emitter closed, bridge exiting");
                    break;
                }
            }
        }
    }
}

/// Convert a [`SessionEvent`] to its wire form.
pub fn session_event_to_rpc(event: &SessionEvent) -> RpcEvent {
    let data = match event {
        SessionEvent::DisplayMessage(message) => to_json(message),
        SessionEvent::DisplayStatusMessage { network, text } => {
            json!({ "network": network, "text": text })
        }
        SessionEvent::BacklogChunk {
            buffer,
            messages,
            is_final,
        } => json!({
            "buffer": to_json(buffer),
            "messages": to_json(messages),
            "isFinal": is_final,
        }),
        SessionEvent::BufferUpdated(buffer) => to_json(buffer),
        SessionEvent::SessionDataChanged { key, value } => {
            json!({ "key": key, "value": value.to_json() })
        }
        SessionEvent::SessionDataKeyChanged { key } => json!({ "key": key }),
        SessionEvent::NetworkState {
            network,
            name,
            state,
        } => json!({ "networkId": network, "name": name, "state": state }),
        SessionEvent::NetworkConnected(network) | SessionEvent::NetworkDisconnected(network) => {
            json!({ "networkId": network })
        }
        SessionEvent::ConnectRequested { network, name } => {
            json!({ "networkId": network, "name": name })
        }
        SessionEvent::EvaluationResult { text } => json!({ "result": text }),
        SessionEvent::Error { category, message } => {
            json!({ "category": category, "message": message })
        }
    };
    RpcEvent::new(event.event_type(), Some(data))
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_default()
}

//! Fan-out of session events to every attached client.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use relay_rpc::RpcEvent;
use tracing::{debug, warn};

use super::connection::{ClientConnection, Frame};

/// Clients currently attached to the session, keyed by client id.
///
/// Publishing holds the read lock only while frames are queued, which
/// never waits, so the lock is a plain synchronous one.
#[derive(Default)]
pub struct BroadcastManager {
    clients: RwLock<BTreeMap<String, Arc<ClientConnection>>>,
}

impl BroadcastManager {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start delivering events to `client`. Replaces a client with the same id.
    pub fn attach(&self, client: Arc<ClientConnection>) {
        let _ = self.clients.write().insert(client.id.clone(), client);
    }

    /// Stop delivering events to `client_id`.
    pub fn detach(&self, client_id: &str) {
        let _ = self.clients.write().remove(client_id);
    }

    /// Queue `event` on every attached client. Returns how many accepted it.
    ///
    /// The event is serialized once. A client with a full queue misses it.
    pub fn publish(&self, event: &RpcEvent) -> usize {
        let frame: Frame = match serde_json::to_string(event) {
            Ok(text) => text.into(),
            Err(e) => {
                warn!(event_type = event.event_type, error = %e, "event not serializable");
                return 0;
            }
        };

        let clients = self.clients.read();
        let mut delivered = 0;
        for client in clients.values() {
            if client.send(Arc::clone(&frame)) {
                delivered += 1;
            } else {
                warn!(client_id = %client.id, dropped = client.drop_count(), "client queue full, event dropped");
            }
        }
        debug!(event_type = event.event_type, delivered, attached = clients.len(), "event published");
        delivered
    }

    /// Attached client count.
    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    /// Whether no client is attached.
    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }
}

//! Storage interfaces consumed by the session core.
//!
//! The session only ever talks to storage through these traits.
//! [`StorageQuery`] is the narrow read-only view handed to the expression
//! evaluator; every [`Storage`] provides it.

use std::collections::BTreeMap;

use relay_core::{
    BufferInfo, Message, MessageId, NetworkId, NewMessage, SessionValue, UserId,
};
use serde::Serialize;
use serde_json::Value;

use crate::errors::Result;

/// A network registered for a user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NetworkInfo {
    /// Network id.
    pub id: NetworkId,
    /// Network name.
    pub name: String,
}

/// Result of a buffer fetch-or-create.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferLookup {
    /// The buffer.
    pub buffer: BufferInfo,
    /// Whether the buffer was created by this call.
    pub created: bool,
}

/// Durable store for networks, buffers, messages and session snapshots.
pub trait Storage: Send + Sync {
    /// Resolve a network name; `None` when the user has no such network.
    fn resolve_network_id(&self, user: UserId, name: &str) -> Result<Option<NetworkId>>;

    /// Register a network name if needed and return its id.
    fn ensure_network(&self, user: UserId, name: &str) -> Result<NetworkId>;

    /// All networks of a user.
    fn list_networks(&self, user: UserId) -> Result<Vec<NetworkInfo>>;

    /// Fetch the buffer for `(network, name)`, creating it when absent.
    fn get_or_create_buffer(&self, user: UserId, network: NetworkId, name: &str)
    -> Result<BufferLookup>;

    /// All buffers of a user.
    fn list_buffers(&self, user: UserId) -> Result<Vec<BufferInfo>>;

    /// Persist a message and return its id.
    fn persist_message(&self, message: &NewMessage) -> Result<MessageId>;

    /// Messages of `buffer` from `start` up to `end` inclusive (unbounded
    /// when `end` is `None`) in stored order.
    fn fetch_messages(
        &self,
        buffer: &BufferInfo,
        start: MessageId,
        end: Option<MessageId>,
    ) -> Result<Vec<Message>>;

    /// Replace the stored session snapshot.
    fn save_session_state(&self, user: UserId, state: &Value) -> Result<()>;

    /// Load the stored session snapshot.
    fn load_session_state(&self, user: UserId) -> Result<Option<Value>>;
}

/// Durable key/value namespace backing session data.
pub trait SessionDataBackend: Send + Sync {
    /// Load all entries of a user.
    fn load_session_data(&self, user: UserId) -> Result<BTreeMap<String, SessionValue>>;

    /// Write one entry.
    fn store_session_data(&self, user: UserId, key: &str, value: &SessionValue) -> Result<()>;
}

/// Read-only view of a user's networks and buffers.
pub trait StorageQuery {
    /// Networks of the user.
    fn networks(&self, user: UserId) -> Result<Vec<NetworkInfo>>;

    /// Buffers of the user.
    fn buffers(&self, user: UserId) -> Result<Vec<BufferInfo>>;
}

impl<T: Storage + ?Sized> StorageQuery for T {
    fn networks(&self, user: UserId) -> Result<Vec<NetworkInfo>> {
        self.list_networks(user)
    }

    fn buffers(&self, user: UserId) -> Result<Vec<BufferInfo>> {
        self.list_buffers(user)
    }
}

//! Session core and storage settings.

use serde::{Deserialize, Serialize};

/// Session core settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// User owning the hosted session.
    pub user_id: i64,
    /// Messages per backlog chunk.
    pub backlog_chunk_size: usize,
    /// Capacity of the session event broadcast channel.
    pub event_capacity: usize,
    /// Reconnect the networks recorded at last shutdown.
    pub restore_on_start: bool,
    /// Network names registered in storage at startup.
    pub networks: Vec<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            user_id: 1,
            backlog_chunk_size: 5,
            event_capacity: 1024,
            restore_on_start: true,
            networks: Vec::new(),
        }
    }
}

/// Database settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    /// Database file, relative paths resolve under `~/.relay`.
    pub db_path: String,
    /// Maximum pooled connections.
    pub pool_size: u32,
    /// `SQLite` busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            db_path: "relay.db".to_string(),
            pool_size: 8,
            busy_timeout_ms: 5000,
        }
    }
}

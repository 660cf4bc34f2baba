//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and implement
//! [`Default`] with production values. `#[serde(default)]` lets a partial
//! JSON file fill in only the fields it cares about.

mod server;
mod session;

pub use server::*;
pub use session::*;

use serde::{Deserialize, Serialize};

/// Root settings type for the relay daemon.
///
/// Loaded from `~/.relay/settings.json` with defaults applied for missing
/// fields. Environment variables can override specific values.
///
/// ```json
/// {
///   "server": { "port": 9400 },
///   "session": { "networks": ["freenode", "oftc"] }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Settings schema version.
    pub version: String,
    /// HTTP/WebSocket server settings.
    pub server: ServerSettings,
    /// Session core settings.
    pub session: SessionSettings,
    /// Database settings.
    pub storage: StorageSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            server: ServerSettings::default(),
            session: SessionSettings::default(),
            storage: StorageSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl RelaySettings {
    /// Reject values no component can work with.
    pub fn validate(&self) -> crate::Result<()> {
        let invalid = |field, reason| Err(crate::SettingsError::Invalid { field, reason });
        if self.session.backlog_chunk_size == 0 {
            return invalid("session.backlogChunkSize", "must be at least 1");
        }
        if self.session.user_id <= 0 {
            return invalid("session.userId", "must be positive");
        }
        if self.storage.pool_size == 0 {
            return invalid("storage.poolSize", "must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        RelaySettings::default().validate().unwrap();
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let mut settings = RelaySettings::default();
        settings.session.backlog_chunk_size = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn serializes_camel_case() {
        let value = serde_json::to_value(RelaySettings::default()).unwrap();
        assert_eq!(value["session"]["backlogChunkSize"], 5);
        assert_eq!(value["server"]["heartbeatIntervalMs"], 30_000);
        assert_eq!(value["storage"]["dbPath"], "relay.db");
    }
}

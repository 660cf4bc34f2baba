//! Session snapshots: capture for persistence, best-effort restore.
//!
//! A snapshot records the user's buffers, session data, registered network
//! ids and, for every connection that is up, its name and opaque state.
//! Restoring only reconnects; buffers and session data already live in
//! storage.

use std::collections::BTreeMap;

use relay_core::{BufferInfo, NetworkId, SessionValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::context::SessionContext;
use crate::errors::Result;
use crate::registry::NetworkRegistry;
use crate::session_data::SessionDataStore;

/// A connected network as recorded in a snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectedNetwork {
    /// Network name.
    pub network: String,
    /// Connection-defined state.
    #[serde(default)]
    pub state: Value,
}

/// Serializable session state.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSnapshot {
    /// Every buffer of the user.
    pub buffers: Vec<BufferInfo>,
    /// Session data entries.
    pub session_data: BTreeMap<String, SessionValue>,
    /// Registered network ids.
    pub networks: Vec<NetworkId>,
    /// Connections that were up.
    pub connected: Vec<ConnectedNetwork>,
}

impl SessionSnapshot {
    /// Encode as JSON.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Decode from JSON. Unknown or missing fields fall back to defaults.
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }
}

/// Outcome of a restore.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    /// Networks a connect was requested for.
    pub restored: Vec<String>,
    /// Networks that could not be restored, with the reason.
    pub failed: Vec<(String, String)>,
}

/// Capture the current session state.
pub fn capture(
    ctx: &SessionContext,
    registry: &NetworkRegistry,
    data: &SessionDataStore,
) -> Result<SessionSnapshot> {
    Ok(SessionSnapshot {
        buffers: ctx.storage.list_buffers(ctx.user)?,
        session_data: data.entries(),
        networks: registry.network_ids(),
        connected: registry.connected_networks(),
    })
}

/// Reconnect every network recorded as connected.
///
/// Entries without a name are skipped. A failing entry is reported and
/// recorded; the remaining entries are still attempted.
pub fn restore(
    ctx: &SessionContext,
    registry: &mut NetworkRegistry,
    snapshot: &SessionSnapshot,
) -> RestoreReport {
    let mut report = RestoreReport::default();
    for entry in &snapshot.connected {
        if entry.network.is_empty() {
            continue;
        }
        match registry.connect_to_network(&entry.network, Some(entry.state.clone())) {
            Ok(_) => report.restored.push(entry.network.clone()),
            Err(e) => {
                ctx.report(&e);
                report.failed.push((entry.network.clone(), e.to_string()));
            }
        }
    }
    info!(
        restored = report.restored.len(),
        failed = report.failed.len(),
        "session restore finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_partial_snapshot() {
        let snapshot = SessionSnapshot::from_value(json!({
            "connected": [{ "network": "freenode", "state": { "nick": "me" } }, { "network": "oftc" }]
        }))
        .unwrap();
        assert!(snapshot.buffers.is_empty());
        assert_eq!(snapshot.connected.len(), 2);
        assert_eq!(snapshot.connected[0].state["nick"], "me");
        assert_eq!(snapshot.connected[1].state, Value::Null);
    }

    #[test]
    fn encodes_camel_case() {
        let mut snapshot = SessionSnapshot::default();
        let _ = snapshot.session_data.insert("k".into(), true.into());
        let value = snapshot.to_value();
        assert_eq!(value["sessionData"]["k"], true);
        assert_eq!(SessionSnapshot::from_value(value).unwrap(), snapshot);
    }
}

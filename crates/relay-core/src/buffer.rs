//! Conversation buffer descriptor.

use serde::{Deserialize, Serialize};

use crate::ids::{BufferId, NetworkId};

/// Identifies one conversation within a network.
///
/// Issued by storage only. The network's status buffer has an empty name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferInfo {
    /// Storage-assigned buffer id.
    pub id: BufferId,
    /// Network the buffer belongs to.
    pub network_id: NetworkId,
    /// Display name of the network.
    pub network_name: String,
    /// Channel or nick name; empty for the status buffer.
    pub name: String,
}

impl BufferInfo {
    /// Whether this is the network's status buffer.
    pub fn is_status(&self) -> bool {
        self.name.is_empty()
    }
}

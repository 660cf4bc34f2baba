//! Network connection interface.
//!
//! A [`NetworkConnection`] drives one chat network. The session creates it
//! through a [`ConnectionFactory`] and never blocks on it: every call is
//! fire-and-forget, and the connection reports back by emitting
//! [`ConnectionEvent`]s into its [`ConnectionEvents`] sink. Those events are
//! queued on the session inbox and handled in order with client requests.

pub mod loopback;

use std::sync::Arc;

use relay_core::{MessageFlags, MessageType, NetworkId, UserId};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::session::SessionCommand;

pub use loopback::{LoopbackConnection, LoopbackFactory};

/// A line received from a network, before routing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    /// Kind of line.
    pub msg_type: MessageType,
    /// Channel or nick the line was addressed to.
    pub target: String,
    /// Line text.
    pub text: String,
    /// Sender mask (`nick!user@host`).
    pub sender: String,
    /// Flags.
    pub flags: MessageFlags,
}

/// Event reported by a connection.
#[derive(Clone, Debug, PartialEq)]
pub enum ConnectionEvent {
    /// The connection is up.
    Connected,
    /// The connection is down and may be torn down.
    Disconnected,
    /// A chat line arrived.
    MessageReceived(InboundMessage),
    /// A status line for the network's status buffer.
    StatusMessage {
        /// Line text.
        text: String,
    },
    /// The connection's opaque state changed.
    StateChanged {
        /// New state.
        state: Value,
    },
}

/// Sink a connection uses to report events.
///
/// Events carry the network id and the generation of the connection the
/// sink was made for. The session ignores events whose generation is not
/// the one currently registered for the network, so a torn-down
/// connection cannot affect its successor.
#[derive(Clone, Debug)]
pub struct ConnectionEvents {
    network: NetworkId,
    generation: u64,
    tx: mpsc::UnboundedSender<SessionCommand>,
}

impl ConnectionEvents {
    pub(crate) fn new(network: NetworkId, generation: u64, tx: mpsc::UnboundedSender<SessionCommand>) -> Self {
        Self { network, generation, tx }
    }

    /// Network this sink reports for.
    pub fn network_id(&self) -> NetworkId {
        self.network
    }

    /// Queue an event for the session. Returns `false` once the session is gone.
    pub fn emit(&self, event: ConnectionEvent) -> bool {
        self.tx
            .send(SessionCommand::Connection {
                network: self.network,
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// Everything a factory needs to build a connection.
#[derive(Clone, Debug)]
pub struct ConnectionSpec {
    /// Session owner.
    pub user: UserId,
    /// Network id.
    pub network: NetworkId,
    /// Network name.
    pub name: String,
    /// State recorded by a previous session, if restoring.
    pub previous_state: Option<Value>,
}

/// Live connection to one chat network.
pub trait NetworkConnection: Send + Sync {
    /// Network id.
    fn network_id(&self) -> NetworkId;

    /// Network name.
    fn network_name(&self) -> &str;

    /// Begin operating. Must not block.
    fn start(&self);

    /// Ask the connection to connect to `name`.
    fn connect(&self, name: &str);

    /// Ask the connection to disconnect from `name`.
    fn disconnect(&self, name: &str);

    /// Submit a line of user input for `target`.
    fn submit_input(&self, network: NetworkId, target: &str, text: &str);

    /// Whether the connection is currently up.
    fn is_connected(&self) -> bool;

    /// Opaque state for snapshots.
    fn state(&self) -> Value;

    /// Release resources. Called once, after the connection left the registry.
    fn shutdown(&self);
}

/// Creates connections on demand.
pub trait ConnectionFactory: Send + Sync {
    /// Build a connection. It must not emit events before [`NetworkConnection::start`].
    fn create(&self, spec: ConnectionSpec, events: ConnectionEvents) -> Arc<dyn NetworkConnection>;
}

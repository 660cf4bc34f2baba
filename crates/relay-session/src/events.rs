//! Session events and the broadcast emitter that carries them.
//!
//! Every change a remote client can observe is a [`SessionEvent`]. The
//! transport layer subscribes to the [`EventEmitter`] and maps each variant
//! to a named wire event.

use std::sync::atomic::{AtomicU64, Ordering};

use relay_core::{BufferInfo, Message, NetworkId, SessionValue};
use serde_json::Value;
use tokio::sync::broadcast;

/// Default broadcast channel capacity.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Outbound session event.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// A persisted message to show in its buffer.
    DisplayMessage(Message),
    /// A transient status line for a network.
    DisplayStatusMessage {
        /// Network name.
        network: String,
        /// Line text.
        text: String,
    },
    /// One chunk of a backlog response.
    BacklogChunk {
        /// Buffer the backlog belongs to.
        buffer: BufferInfo,
        /// Messages in stored order.
        messages: Vec<Message>,
        /// Set on the last chunk only.
        is_final: bool,
    },
    /// A buffer was created.
    BufferUpdated(BufferInfo),
    /// A session-data key was written, with its new value.
    SessionDataChanged {
        /// Key.
        key: String,
        /// New value.
        value: SessionValue,
    },
    /// A session-data key was written.
    SessionDataKeyChanged {
        /// Key.
        key: String,
    },
    /// Opaque state of a network connection.
    NetworkState {
        /// Network id.
        network: NetworkId,
        /// Network name.
        name: String,
        /// Connection-defined state.
        state: Value,
    },
    /// A network connection came up.
    NetworkConnected(NetworkId),
    /// A network connection went down.
    NetworkDisconnected(NetworkId),
    /// A connect was requested for a network.
    ConnectRequested {
        /// Network id.
        network: NetworkId,
        /// Network name.
        name: String,
    },
    /// Result text of an expression evaluation.
    EvaluationResult {
        /// Rendered result or error text.
        text: String,
    },
    /// A session operation failed.
    Error {
        /// Error category.
        category: String,
        /// Human-readable message.
        message: String,
    },
}

impl SessionEvent {
    /// Wire name of the event.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::DisplayMessage(_) => "message.display",
            Self::DisplayStatusMessage { .. } => "status.display",
            Self::BacklogChunk { .. } => "backlog.chunk",
            Self::BufferUpdated(_) => "buffer.updated",
            Self::SessionDataChanged { .. } => "sessionData.changed",
            Self::SessionDataKeyChanged { .. } => "sessionData.keyChanged",
            Self::NetworkState { .. } => "network.state",
            Self::NetworkConnected(_) => "network.connected",
            Self::NetworkDisconnected(_) => "network.disconnected",
            Self::ConnectRequested { .. } => "network.connectRequested",
            Self::EvaluationResult { .. } => "script.result",
            Self::Error { .. } => "session.error",
        }
    }
}

/// Broadcast-based event emitter.
///
/// `emit` never awaits. Slow receivers lag rather than block the sender.
pub struct EventEmitter {
    tx: broadcast::Sender<SessionEvent>,
    capacity: usize,
    emit_count: AtomicU64,
}

impl EventEmitter {
    /// Create a new emitter with the default channel capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new emitter with a custom channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            capacity,
            emit_count: AtomicU64::new(0),
        }
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns the number of receivers, 0 when nobody listens.
    pub fn emit(&self, event: SessionEvent) -> usize {
        let _ = self.emit_count.fetch_add(1, Ordering::Relaxed);
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Events a subscriber can fall behind by before it starts losing them.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Total number of events emitted.
    pub fn emit_count(&self) -> u64 {
        self.emit_count.load(Ordering::Relaxed)
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

//! # relay-session
//!
//! Per-user session core of the relay hub.
//!
//! - **[`CoreSession`]**: the actor owning one user's session, driven through
//!   a cloneable [`SessionHandle`]
//! - **Registry**: [`NetworkRegistry`] creates, connects and tears down
//!   network connections
//! - **Routing**: [`MessageRouter`] persists inbound lines before they are
//!   broadcast
//! - **Backlog**: [`BacklogDispatcher`] replays history in bounded chunks
//! - **Session data**: [`SessionDataStore`], a write-through key/value map
//! - **Snapshots**: [`SessionSnapshot`] capture and best-effort restore
//! - **Events**: every observable change is a [`SessionEvent`] on the
//!   [`EventEmitter`]
//! - **Connections**: the [`NetworkConnection`] / [`ConnectionFactory`]
//!   seam, with an in-process [`LoopbackConnection`]

#![deny(unsafe_code)]

pub mod backlog;
pub mod connection;
pub mod context;
pub mod errors;
pub mod events;
pub mod registry;
pub mod router;
pub mod script;
pub mod session;
pub mod session_data;
pub mod snapshot;
pub mod test_helpers;

pub use backlog::{BacklogDispatcher, BacklogRange, BacklogSent, DEFAULT_CHUNK_SIZE, chunk_messages};
pub use connection::{
    ConnectionEvent, ConnectionEvents, ConnectionFactory, ConnectionSpec, InboundMessage,
    LoopbackConnection, LoopbackFactory, NetworkConnection,
};
pub use context::SessionContext;
pub use errors::{Result, SessionError};
pub use events::{EventEmitter, SessionEvent};
pub use registry::{NetworkRegistry, NetworkStateReport};
pub use router::{MessageRouter, route_target};
pub use session::{CoreSession, SessionConfig, SessionHandle};
pub use session_data::SessionDataStore;
pub use snapshot::{ConnectedNetwork, RestoreReport, SessionSnapshot};

//! Dependencies handed to every RPC handler.

use std::time::Instant;

use relay_session::SessionHandle;

/// Shared context passed to every RPC handler.
pub struct RpcContext {
    /// The session the transport serves.
    pub session: SessionHandle,
    /// When the server started (for uptime calculation).
    pub server_start_time: Instant,
}

impl RpcContext {
    /// Context for `session`, starting the uptime clock now.
    pub fn new(session: SessionHandle) -> Self {
        Self {
            session,
            server_start_time: Instant::now(),
        }
    }
}

//! # relay-server
//!
//! Axum HTTP + `WebSocket` transport for one relay session.
//!
//! - HTTP endpoint: `/health`
//! - `WebSocket` gateway at `/ws`: connection limit, heartbeat, RPC dispatch
//! - Session events fanned out to every client through the event bridge
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use server::RelayServer;
pub use shutdown::ShutdownCoordinator;

#[cfg(test)]
pub(crate) mod test_helpers {
    use std::sync::Arc;

    use relay_rpc::RpcContext;
    use relay_session::LoopbackFactory;
    use relay_session::test_helpers::{memory_storage, session_with};
    use tokio_util::sync::CancellationToken;

    /// `RpcContext` over a running loopback session. Needs a Tokio runtime.
    pub fn make_test_context() -> RpcContext {
        let session = session_with(memory_storage(), Arc::new(LoopbackFactory::new("relay")));
        let (handle, _task) = session.spawn(CancellationToken::new());
        RpcContext::new(handle)
    }
}

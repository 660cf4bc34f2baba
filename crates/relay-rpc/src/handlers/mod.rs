//! Method handlers, one module per method group.

pub mod backlog;
pub mod buffer;
pub mod network;
mod params;
pub mod script;
pub mod session_data;
pub mod snapshot;
pub mod system;

use crate::registry::MethodRegistry;

/// Bind every method the relay serves.
pub fn register_all(registry: &mut MethodRegistry) {
    let groups: [fn(&mut MethodRegistry); 7] = [
        system::register,
        network::register,
        buffer::register,
        backlog::register,
        session_data::register,
        script::register,
        snapshot::register,
    ];
    for register in groups {
        register(registry);
    }
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use std::sync::Arc;

    use relay_session::LoopbackFactory;
    use relay_session::test_helpers::{memory_storage, session_with};
    use tokio_util::sync::CancellationToken;

    use crate::context::RpcContext;

    /// Context over a running session with in-memory storage and loopback
    /// connections. Needs a Tokio runtime.
    pub fn make_test_context() -> RpcContext {
        let session = session_with(memory_storage(), Arc::new(LoopbackFactory::new("relay")));
        let (handle, _task) = session.spawn(CancellationToken::new());
        RpcContext::new(handle)
    }
}

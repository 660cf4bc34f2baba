//! Snapshot handler.

use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;

use crate::context::RpcContext;
use crate::errors::RpcError;
use crate::registry::{MethodHandler, MethodRegistry};

/// Returns the current session snapshot: buffers, session data and
/// connected networks.
pub struct SnapshotHandler;

#[async_trait]
impl MethodHandler for SnapshotHandler {
    #[instrument(skip(self, ctx), fields(method = "session.snapshot"))]
    async fn handle(&self, _params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let snapshot = ctx.session.snapshot().await?;
        Ok(snapshot.to_value())
    }
}

pub(crate) fn register(registry: &mut MethodRegistry) {
    registry.register("session.snapshot", SnapshotHandler);
}

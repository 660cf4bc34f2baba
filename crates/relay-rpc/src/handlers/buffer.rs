//! Buffer handlers: sendInput, list.

use async_trait::async_trait;
use relay_core::BufferInfo;
use serde_json::{Value, json};
use tracing::instrument;

use crate::context::RpcContext;
use crate::errors::RpcError;
use crate::handlers::params::Params;
use crate::registry::{MethodHandler, MethodRegistry};

/// Forwards a line of user input to the buffer's network.
pub struct SendInputHandler;

#[async_trait]
impl MethodHandler for SendInputHandler {
    #[instrument(skip(self, ctx, params), fields(method = "buffer.sendInput"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let params = Params::new(params.as_ref());
        let buffer: BufferInfo = params.parse("buffer")?;
        let text = params.string("text")?;
        ctx.session.send_input(buffer, text).await?;
        Ok(json!({ "sent": true }))
    }
}

/// Lists every buffer of the session's user.
pub struct ListBuffersHandler;

#[async_trait]
impl MethodHandler for ListBuffersHandler {
    #[instrument(skip(self, ctx), fields(method = "buffer.list"))]
    async fn handle(&self, _params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let buffers = ctx.session.list_buffers().await?;
        Ok(json!({ "buffers": buffers }))
    }
}

pub(crate) fn register(registry: &mut MethodRegistry) {
    registry.register("buffer.sendInput", SendInputHandler);
    registry.register("buffer.list", ListBuffersHandler);
}

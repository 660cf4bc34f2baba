//! Script handler: evaluate.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::instrument;

use crate::context::RpcContext;
use crate::errors::RpcError;
use crate::handlers::params::Params;
use crate::registry::{MethodHandler, MethodRegistry};

/// Evaluates an expression over the user's networks and buffers.
///
/// The result text is also pushed as a `script.result` event.
pub struct EvaluateHandler;

#[async_trait]
impl MethodHandler for EvaluateHandler {
    #[instrument(skip(self, ctx, params), fields(method = "script.evaluate"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let expression = Params::new(params.as_ref()).string("expression")?;
        let result = ctx.session.evaluate(expression).await?;
        Ok(json!({ "result": result }))
    }
}

pub(crate) fn register(registry: &mut MethodRegistry) {
    registry.register("script.evaluate", EvaluateHandler);
}

//! Network handlers: requestStates, connect, disconnect.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::instrument;

use crate::context::RpcContext;
use crate::errors::RpcError;
use crate::handlers::params::Params;
use crate::registry::{MethodHandler, MethodRegistry};

/// Reports the state of every registered connection.
///
/// Each state is also pushed as a `network.state` event.
pub struct RequestStatesHandler;

#[async_trait]
impl MethodHandler for RequestStatesHandler {
    #[instrument(skip(self, ctx), fields(method = "network.requestStates"))]
    async fn handle(&self, _params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let networks = ctx.session.network_states().await?;
        Ok(json!({ "networks": networks }))
    }
}

/// Connects to a network by name.
pub struct ConnectHandler;

#[async_trait]
impl MethodHandler for ConnectHandler {
    #[instrument(skip(self, ctx), fields(method = "network.connect"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let name = Params::new(params.as_ref()).string("network")?;
        let id = ctx.session.connect(name).await?;
        Ok(json!({ "networkId": id }))
    }
}

/// Disconnects from a network by name.
pub struct DisconnectHandler;

#[async_trait]
impl MethodHandler for DisconnectHandler {
    #[instrument(skip(self, ctx), fields(method = "network.disconnect"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let name = Params::new(params.as_ref()).string("network")?;
        let id = ctx.session.disconnect(name).await?;
        Ok(json!({ "networkId": id }))
    }
}

pub(crate) fn register(registry: &mut MethodRegistry) {
    registry.register("network.requestStates", RequestStatesHandler);
    registry.register("network.connect", ConnectHandler);
    registry.register("network.disconnect", DisconnectHandler);
}

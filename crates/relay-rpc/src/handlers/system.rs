//! `system.ping` and `system.getInfo`.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use relay_core::{NetworkId, UserId};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::instrument;

use crate::context::RpcContext;
use crate::errors::RpcError;
use crate::registry::{MethodHandler, MethodRegistry};

/// Liveness probe. Answers with the server clock so clients can estimate skew.
pub struct PingHandler;

#[async_trait]
impl MethodHandler for PingHandler {
    #[instrument(skip_all, fields(method = "system.ping"))]
    async fn handle(&self, _params: Option<Value>, _ctx: &RpcContext) -> Result<Value, RpcError> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        Ok(json!({ "pong": true, "timestamp": now }))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfo {
    version: &'static str,
    uptime: u64,
    user_id: UserId,
    registered_networks: Vec<NetworkId>,
    platform: &'static str,
    arch: &'static str,
}

/// Build and host details plus the networks the session currently holds.
pub struct GetInfoHandler;

#[async_trait]
impl MethodHandler for GetInfoHandler {
    #[instrument(skip_all, fields(method = "system.getInfo"))]
    async fn handle(&self, _params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let info = ServerInfo {
            version: env!("CARGO_PKG_VERSION"),
            uptime: ctx.server_start_time.elapsed().as_secs(),
            user_id: ctx.session.user(),
            registered_networks: ctx.session.registered_networks().await?,
            platform: std::env::consts::OS,
            arch: std::env::consts::ARCH,
        };
        serde_json::to_value(info).map_err(|e| RpcError::Internal {
            message: format!("serializing server info: {e}"),
        })
    }
}

pub(crate) fn register(registry: &mut MethodRegistry) {
    registry.register("system.ping", PingHandler);
    registry.register("system.getInfo", GetInfoHandler);
}

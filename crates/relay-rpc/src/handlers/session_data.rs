//! Session data handlers: set, get.

use async_trait::async_trait;
use relay_core::SessionValue;
use serde_json::{Value, json};
use tracing::instrument;

use crate::context::RpcContext;
use crate::errors::RpcError;
use crate::handlers::params::Params;
use crate::registry::{MethodHandler, MethodRegistry};

/// Writes a session data entry.
pub struct SetHandler;

#[async_trait]
impl MethodHandler for SetHandler {
    #[instrument(skip(self, ctx, params), fields(method = "sessionData.set"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let params = Params::new(params.as_ref());
        let key = params.string("key")?;
        let value: SessionValue = params.parse("value")?;
        ctx.session.set_session_data(key, value).await?;
        Ok(json!({ "stored": true }))
    }
}

/// Reads a session data entry; `value` is null when the key is unset.
pub struct GetHandler;

#[async_trait]
impl MethodHandler for GetHandler {
    #[instrument(skip(self, ctx, params), fields(method = "sessionData.get"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let key = Params::new(params.as_ref()).string("key")?;
        let value = ctx
            .session
            .session_data(&key)
            .map_or(Value::Null, |v| v.to_json());
        Ok(json!({ "key": key, "value": value }))
    }
}

pub(crate) fn register(registry: &mut MethodRegistry) {
    registry.register("sessionData.set", SetHandler);
    registry.register("sessionData.get", GetHandler);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_helpers::make_test_context;
    use relay_session::SessionEvent;
    use relay_session::test_helpers::drain;

    #[tokio::test]
    async fn set_then_get() {
        let ctx = make_test_context();
        let mut rx = ctx.session.subscribe();

        let params = json!({"key": "layout", "value": {"columns": 2, "tabs": ["a", "b"]}});
        let result = SetHandler.handle(Some(params), &ctx).await.unwrap();
        assert_eq!(result["stored"], true);

        let got = GetHandler
            .handle(Some(json!({"key": "layout"})), &ctx)
            .await
            .unwrap();
        assert_eq!(got["value"]["columns"], 2);
        assert_eq!(got["value"]["tabs"][1], "b");

        let events = drain(&mut rx);
        assert!(events.contains(&SessionEvent::SessionDataKeyChanged { key: "layout".into() }));
    }

    #[tokio::test]
    async fn get_missing_key_is_null() {
        let ctx = make_test_context();
        let got = GetHandler
            .handle(Some(json!({"key": "absent"})), &ctx)
            .await
            .unwrap();
        assert!(got["value"].is_null());
    }

    #[tokio::test]
    async fn set_rejects_unsupported_value() {
        let ctx = make_test_context();
        let err = SetHandler
            .handle(Some(json!({"key": "k", "value": 1.5})), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");
    }
}

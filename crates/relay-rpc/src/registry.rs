//! [`MethodRegistry`]: method name → handler table with bounded execution.
//!
//! Every call runs under the registry's timeout. Calls slower than
//! [`SLOW_CALL_THRESHOLD`] are logged even when they succeed.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::context::RpcContext;
use crate::errors::{self, RpcError};
use crate::types::{RpcRequest, RpcResponse};

/// Timeout applied when none is configured.
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(60);

/// Successful calls at least this slow are logged at warn level.
pub const SLOW_CALL_THRESHOLD: Duration = Duration::from_secs(5);

/// One RPC method.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Run the method against the session behind `ctx`.
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError>;
}

/// Registered methods, kept sorted by name.
pub struct MethodRegistry {
    handlers: BTreeMap<String, Arc<dyn MethodHandler>>,
    timeout: Duration,
}

impl MethodRegistry {
    /// Empty registry using [`DEFAULT_HANDLER_TIMEOUT`].
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
            timeout: DEFAULT_HANDLER_TIMEOUT,
        }
    }

    /// Same registry with a different per-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Per-call timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Bind `method` to `handler`, replacing any earlier binding.
    pub fn register(&mut self, method: &str, handler: impl MethodHandler + 'static) {
        if self.handlers.insert(method.to_owned(), Arc::new(handler)).is_some() {
            debug!(method, "handler replaced");
        }
    }

    /// Run `request` and build its response. Never fails: unknown methods,
    /// handler errors and timeouts all become error responses carrying the
    /// request id.
    pub async fn dispatch(&self, request: RpcRequest, ctx: &RpcContext) -> RpcResponse {
        let RpcRequest { id, method, params } = request;
        let Some(handler) = self.handlers.get(&method) else {
            return RpcResponse::error(
                &id,
                errors::METHOD_NOT_FOUND,
                format!("Method '{method}' not found"),
            );
        };

        let started = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, handler.handle(params, ctx)).await;
        let elapsed = started.elapsed();

        match outcome {
            Ok(Ok(value)) => {
                if elapsed >= SLOW_CALL_THRESHOLD {
                    warn!(method, ?elapsed, "slow RPC call");
                }
                RpcResponse::success(&id, value)
            }
            Ok(Err(err)) => {
                debug!(method, code = err.code(), "RPC call failed");
                RpcResponse::failure(&id, err.to_error_body())
            }
            Err(_) => {
                error!(method, timeout = ?self.timeout, "RPC handler timed out");
                RpcResponse::error(
                    &id,
                    errors::INTERNAL_ERROR,
                    format!("Handler for '{method}' timed out"),
                )
            }
        }
    }

    /// Registered method names in ascending order.
    pub fn methods(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    /// Whether `method` is bound.
    pub fn has_method(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}

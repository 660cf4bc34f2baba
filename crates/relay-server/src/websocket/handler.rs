//! Turning one inbound text frame into one outbound reply.

use relay_rpc::errors::INVALID_PARAMS;
use relay_rpc::{MethodRegistry, RpcContext, RpcRequest, RpcResponse};
use serde::Deserialize;
use tracing::{debug, error, instrument};

/// Id echoed when a frame is too broken to carry one.
pub const UNKNOWN_REQUEST_ID: &str = "unknown";

/// Outcome of one frame.
#[derive(Debug)]
pub struct Reply {
    /// Method the frame asked for, `None` when the frame was not a request.
    pub method: Option<String>,
    /// Response owed to the client.
    pub response: RpcResponse,
}

impl Reply {
    /// Wire text of the response. `None` only if serialization fails, which
    /// is logged.
    pub fn encode(&self) -> Option<String> {
        serde_json::to_string(&self.response)
            .inspect_err(|e| error!(id = %self.response.id, error = %e, "response not serializable"))
            .ok()
    }
}

/// Parse `frame` as a request and dispatch it.
///
/// Frames that are not requests are answered with `INVALID_PARAMS`. The
/// reply keeps the frame's `id` when it has a string one.
#[instrument(skip_all, fields(method))]
pub async fn handle_message(frame: &str, registry: &MethodRegistry, ctx: &RpcContext) -> Reply {
    let request = match serde_json::from_str::<RpcRequest>(frame) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, len = frame.len(), "frame is not a request");
            return Reply {
                method: None,
                response: RpcResponse::error(
                    request_id_of(frame).unwrap_or_else(|| UNKNOWN_REQUEST_ID.to_owned()),
                    INVALID_PARAMS,
                    format!("Invalid JSON: {e}"),
                ),
            };
        }
    };

    let method = request.method.clone();
    let _ = tracing::Span::current().record("method", method.as_str());
    debug!(id = %request.id, "dispatching");
    Reply {
        response: registry.dispatch(request, ctx).await,
        method: Some(method),
    }
}

/// The `id` of a frame that parsed as JSON but not as a request.
fn request_id_of(frame: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct IdOnly {
        id: String,
    }
    serde_json::from_str::<IdOnly>(frame).ok().map(|f| f.id)
}

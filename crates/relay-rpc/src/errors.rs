//! Wire error codes and [`RpcError`].
//!
//! Session failures keep their [`SessionError`] and get their code from its
//! variant, so handlers can use `?` on session calls directly.

use relay_session::SessionError;
use serde_json::json;

use crate::types::RpcErrorBody;

/// Missing or malformed parameter.
pub const INVALID_PARAMS: &str = "INVALID_PARAMS";
/// Handler bug, invariant violation or timeout.
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
/// No handler bound to the method name.
pub const METHOD_NOT_FOUND: &str = "METHOD_NOT_FOUND";
/// The session task is gone.
pub const NOT_AVAILABLE: &str = "NOT_AVAILABLE";
/// Network name unknown to storage.
pub const NETWORK_NOT_FOUND: &str = "NETWORK_NOT_FOUND";
/// No connection registered for the network.
pub const NOT_CONNECTED: &str = "NOT_CONNECTED";
/// Inbound message could not be stored.
pub const DELIVERY_FAILED: &str = "DELIVERY_FAILED";
/// Recognised request that is not implemented.
pub const NOT_SUPPORTED: &str = "NOT_SUPPORTED";
/// Expression failed to evaluate.
pub const EVALUATION_ERROR: &str = "EVALUATION_ERROR";
/// Database failure.
pub const STORAGE_ERROR: &str = "STORAGE_ERROR";

/// Error returned by a [`MethodHandler`](crate::MethodHandler).
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Bad request parameters.
    #[error("{message}")]
    InvalidParams {
        /// What is wrong with them.
        message: String,
    },

    /// The session refused or failed the operation.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Failure inside the RPC layer itself.
    #[error("{message}")]
    Internal {
        /// Description.
        message: String,
    },
}

impl RpcError {
    /// Wire code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidParams { .. } => INVALID_PARAMS,
            Self::Internal { .. } => INTERNAL_ERROR,
            Self::Session(err) => match err {
                SessionError::NetworkUnresolved { .. } => NETWORK_NOT_FOUND,
                SessionError::NotConnected(_) => NOT_CONNECTED,
                SessionError::DeliveryFailed { .. } => DELIVERY_FAILED,
                SessionError::Unsupported(_) => NOT_SUPPORTED,
                SessionError::Evaluation(_) => EVALUATION_ERROR,
                SessionError::Storage(_) => STORAGE_ERROR,
                SessionError::Invariant { .. } => INTERNAL_ERROR,
                SessionError::Closed => NOT_AVAILABLE,
            },
        }
    }

    /// Body for an error response. Session errors carry their category in
    /// `details`.
    pub fn to_error_body(&self) -> RpcErrorBody {
        let details = match self {
            Self::Session(err) => Some(json!({ "category": err.category() })),
            _ => None,
        };
        RpcErrorBody {
            code: self.code().to_owned(),
            message: self.to_string(),
            details,
        }
    }
}

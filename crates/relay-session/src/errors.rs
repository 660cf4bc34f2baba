//! Session error types.

use relay_core::{NetworkId, UserId};
use relay_store::StoreError;

/// Errors returned by session operations.
///
/// None of these are fatal to the session: the failing operation is
/// abandoned and the session keeps serving other requests.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The network name has no id in storage.
    #[error("Network not found: {name}")]
    NetworkUnresolved {
        /// Name that failed to resolve.
        name: String,
    },

    /// No connection is registered for the network.
    #[error("Network {0} is not connected")]
    NotConnected(NetworkId),

    /// Internal bookkeeping disagreed with an incoming event.
    #[error("Invariant violated (user {user}, network {network}): {detail}")]
    Invariant {
        /// Session owner.
        user: UserId,
        /// Network involved.
        network: NetworkId,
        /// What went wrong.
        detail: String,
    },

    /// A message could not be persisted and was not delivered.
    #[error("Delivery failed (user {user}, network {network}, buffer {buffer:?}): {detail}")]
    DeliveryFailed {
        /// Session owner.
        user: UserId,
        /// Network the message came from.
        network: NetworkId,
        /// Buffer name the message was routed to.
        buffer: String,
        /// Underlying failure.
        detail: String,
    },

    /// The request shape is recognised but not implemented.
    #[error("Not supported: {0}")]
    Unsupported(String),

    /// Expression evaluation failed.
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Storage failure outside the delivery path.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// The session task has stopped.
    #[error("Session closed")]
    Closed,
}

impl SessionError {
    /// Error category string for event emission.
    pub fn category(&self) -> &'static str {
        match self {
            Self::NetworkUnresolved { .. } => "network_unresolved",
            Self::NotConnected(_) => "not_connected",
            Self::Invariant { .. } => "invariant",
            Self::DeliveryFailed { .. } => "delivery_failed",
            Self::Unsupported(_) => "unsupported",
            Self::Evaluation(_) => "evaluation",
            Self::Storage(_) => "storage",
            Self::Closed => "closed",
        }
    }
}

/// Convenience type alias for session results.
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_display() {
        let err = SessionError::NetworkUnresolved {
            name: "nowhere".into(),
        };
        assert_eq!(err.to_string(), "Network not found: nowhere");
        assert_eq!(err.category(), "network_unresolved");
    }

    #[test]
    fn delivery_failed_carries_context() {
        let err = SessionError::DeliveryFailed {
            user: UserId::new(1),
            network: NetworkId::new(2),
            buffer: "#rust".into(),
            detail: "disk full".into(),
        };
        let text = err.to_string();
        assert!(text.contains("user 1"));
        assert!(text.contains("network 2"));
        assert!(text.contains("\"#rust\""));
        assert!(text.contains("disk full"));
    }

    #[test]
    fn storage_from_conversion() {
        let err: SessionError = StoreError::NotFound("x".into()).into();
        assert_eq!(err.category(), "storage");
    }
}

//! Dependencies shared by the session components.

use std::sync::Arc;

use relay_core::UserId;
use relay_store::Storage;

use crate::errors::SessionError;
use crate::events::{EventEmitter, SessionEvent};

/// Owner, storage and event sink of one session.
pub struct SessionContext {
    /// Session owner.
    pub user: UserId,
    /// Durable store.
    pub storage: Arc<dyn Storage>,
    /// Outbound events.
    pub events: Arc<EventEmitter>,
}

impl SessionContext {
    /// Emit an event, ignoring whether anyone listens.
    pub fn emit(&self, event: SessionEvent) {
        let _ = self.events.emit(event);
    }

    /// Log a failed operation and publish it as a `session.error` event.
    pub fn report(&self, err: &SessionError) {
        tracing::warn!(
            user = %self.user,
            category = err.category(),
            error = %err,
            "session operation failed"
        );
        self.emit(SessionEvent::Error {
            category: err.category().to_owned(),
            message: err.to_string(),
        });
    }
}

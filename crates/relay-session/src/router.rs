//! Inbound message routing: pick the buffer, persist, then broadcast.

use std::sync::Arc;

use relay_core::{Message, MessageFlags, NetworkId, NewMessage, nick_from_mask};
use tracing::trace;

use crate::connection::InboundMessage;
use crate::context::SessionContext;
use crate::errors::{Result, SessionError};
use crate::events::SessionEvent;

/// Buffer name an inbound line belongs to.
///
/// A private message from someone else lands in a query buffer named after
/// the sender's nick; everything else goes to the addressed target.
pub fn route_target(message: &InboundMessage) -> &str {
    if message.flags.contains(MessageFlags::PRIVATE) && !message.flags.contains(MessageFlags::SELF) {
        nick_from_mask(&message.sender)
    } else {
        &message.target
    }
}

/// Routes connection output into buffers.
pub struct MessageRouter {
    ctx: Arc<SessionContext>,
}

impl MessageRouter {
    pub(crate) fn new(ctx: Arc<SessionContext>) -> Self {
        Self { ctx }
    }

    /// Persist an inbound line and broadcast it.
    ///
    /// Nothing is broadcast unless storage returned a valid id.
    pub fn on_message_from_connection(
        &self,
        network: NetworkId,
        inbound: InboundMessage,
    ) -> Result<Message> {
        let user = self.ctx.user;
        let target = route_target(&inbound).to_owned();
        let delivery_failed = |detail: String| SessionError::DeliveryFailed {
            user,
            network,
            buffer: target.clone(),
            detail,
        };

        let lookup = self
            .ctx
            .storage
            .get_or_create_buffer(user, network, &target)
            .map_err(|e| delivery_failed(e.to_string()))?;
        if lookup.created {
            self.ctx.emit(SessionEvent::BufferUpdated(lookup.buffer.clone()));
        }

        let draft = NewMessage::new(
            lookup.buffer,
            inbound.msg_type,
            inbound.text,
            inbound.sender,
            inbound.flags,
        );
        let id = self
            .ctx
            .storage
            .persist_message(&draft)
            .map_err(|e| delivery_failed(e.to_string()))?;
        let message = draft.into_persisted(id).map_err(|e| SessionError::Invariant {
            user,
            network,
            detail: format!("{e} for buffer {target:?}"),
        })?;

        trace!(network = %network, buffer = %target, id = %message.id, "message routed");
        self.ctx.emit(SessionEvent::DisplayMessage(message.clone()));
        Ok(message)
    }

    /// Broadcast a transient status line. Not persisted.
    pub fn on_status_message_from_connection(&self, network_name: &str, text: String) {
        self.ctx.emit(SessionEvent::DisplayStatusMessage {
            network: network_name.to_owned(),
            text,
        });
    }
}

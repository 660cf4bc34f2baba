//! Backlog delivery in bounded chunks.
//!
//! A backlog request fetches a range of stored messages and emits them as
//! `BacklogChunk` events of at most `chunk_size` messages. Only the last
//! chunk is marked final; an empty range emits nothing.
//!
//! One request emits at most half the event channel's capacity in chunks,
//! so a subscriber that keeps up between requests never loses a chunk. A
//! longer range stops early: its last chunk is not final and the result
//! names the id to continue from.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use relay_core::{BufferInfo, Message, MessageId};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::context::SessionContext;
use crate::errors::{Result, SessionError};
use crate::events::SessionEvent;

/// Default number of messages per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 5;

/// Range of a backlog request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BacklogRange {
    /// Messages with `start <= id <= end`; no upper bound when `end` is `None`.
    MessageIds {
        /// First id.
        start: MessageId,
        /// Last id.
        end: Option<MessageId>,
    },
    /// Messages in a time window. Not supported.
    Timestamps {
        /// Window start.
        start: DateTime<Utc>,
        /// Window end.
        end: Option<DateTime<Utc>>,
    },
}

/// What a backlog request emitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BacklogSent {
    /// Messages emitted.
    pub sent: usize,
    /// First id left out because the request reached its chunk budget.
    /// `None` once the range is exhausted.
    pub next_start: Option<MessageId>,
}

/// Split `messages` into chunks, pairing each with its final flag.
pub fn chunk_messages(messages: Vec<Message>, chunk_size: usize) -> Vec<(Vec<Message>, bool)> {
    let chunk_size = chunk_size.max(1);
    let count = messages.len().div_ceil(chunk_size);
    let mut chunks = Vec::with_capacity(count);
    let mut rest = messages.into_iter();
    for index in 0..count {
        let chunk: Vec<_> = rest.by_ref().take(chunk_size).collect();
        chunks.push((chunk, index + 1 == count));
    }
    chunks
}

/// Serves backlog requests.
pub struct BacklogDispatcher {
    ctx: Arc<SessionContext>,
    chunk_size: usize,
    max_chunks: usize,
}

impl BacklogDispatcher {
    pub(crate) fn new(ctx: Arc<SessionContext>, chunk_size: usize) -> Self {
        let max_chunks = (ctx.events.capacity() / 2).max(1);
        Self {
            ctx,
            chunk_size: chunk_size.max(1),
            max_chunks,
        }
    }

    /// Messages per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Most messages one request emits.
    pub fn max_messages(&self) -> usize {
        self.max_chunks * self.chunk_size
    }

    /// Fetch and emit the backlog of `buffer`.
    #[instrument(skip(self, buffer), fields(buffer = %buffer.id))]
    pub fn request_backlog(&self, buffer: &BufferInfo, range: BacklogRange) -> Result<BacklogSent> {
        let (start, end) = match range {
            BacklogRange::MessageIds { start, end } => (start, end),
            BacklogRange::Timestamps { .. } => {
                return Err(SessionError::Unsupported(
                    "backlog by timestamp range".to_owned(),
                ));
            }
        };

        let mut messages = self.ctx.storage.fetch_messages(buffer, start, end)?;
        let next_start = if messages.len() > self.max_messages() {
            messages.split_off(self.max_messages()).first().map(|m| m.id)
        } else {
            None
        };
        let sent = messages.len();

        let mut chunks = chunk_messages(messages, self.chunk_size);
        if next_start.is_some() {
            if let Some((_, is_final)) = chunks.last_mut() {
                *is_final = false;
            }
        }
        for (messages, is_final) in chunks {
            self.ctx.emit(SessionEvent::BacklogChunk {
                buffer: buffer.clone(),
                messages,
                is_final,
            });
        }
        debug!(sent, ?next_start, chunk_size = self.chunk_size, "backlog sent");
        Ok(BacklogSent { sent, next_start })
    }
}

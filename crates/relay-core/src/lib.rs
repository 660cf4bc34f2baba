//! # relay-core
//!
//! Foundation types shared by every relay crate.
//!
//! - **Numeric IDs**: [`UserId`], [`NetworkId`], [`BufferId`], [`MessageId`] as newtypes
//! - **Buffers**: [`BufferInfo`], the storage-issued descriptor of a conversation
//! - **Messages**: [`NewMessage`] drafts and persisted [`Message`] values
//! - **Session values**: [`SessionValue`], the tagged union stored in session data
//! - **Logging**: [`logging::init_subscriber`] for the `tracing` subscriber

#![deny(unsafe_code)]

pub mod buffer;
pub mod ids;
pub mod logging;
pub mod message;
pub mod value;

pub use buffer::BufferInfo;
pub use ids::{BufferId, MessageId, NetworkId, UserId};
pub use message::{
    InvalidMessageId, Message, MessageFlags, MessageType, NewMessage, nick_from_mask,
};
pub use value::SessionValue;

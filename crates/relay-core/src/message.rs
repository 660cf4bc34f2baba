//! Chat messages.
//!
//! A [`NewMessage`] is a draft built from connection input. It becomes a
//! [`Message`] only once storage has assigned it a non-zero [`MessageId`], so
//! every `Message` a client can observe is durable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::buffer::BufferInfo;
use crate::ids::MessageId;

/// Kind of chat line. Discriminants match the stored integer codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[repr(u32)]
pub enum MessageType {
    /// Ordinary channel or query text.
    Plain = 0x0001,
    /// Notice.
    Notice = 0x0002,
    /// `/me` action.
    Action = 0x0004,
    /// Nick change.
    Nick = 0x0008,
    /// Mode change.
    Mode = 0x0010,
    /// Join.
    Join = 0x0020,
    /// Part.
    Part = 0x0040,
    /// Quit.
    Quit = 0x0080,
    /// Kick.
    Kick = 0x0100,
    /// Kill.
    Kill = 0x0200,
    /// Server message.
    Server = 0x0400,
    /// Informational line.
    Info = 0x0800,
    /// Error line.
    Error = 0x1000,
}

impl MessageType {
    const ALL: [Self; 13] = [
        Self::Plain,
        Self::Notice,
        Self::Action,
        Self::Nick,
        Self::Mode,
        Self::Join,
        Self::Part,
        Self::Quit,
        Self::Kick,
        Self::Kill,
        Self::Server,
        Self::Info,
        Self::Error,
    ];

    /// Integer code used in storage.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Parse a stored integer code.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }
}

/// Bit set of per-message flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageFlags(u8);

impl MessageFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// Echo of a line the user sent.
    pub const SELF: Self = Self(0x01);
    /// Private message addressed to the user.
    pub const PRIVATE: Self = Self(0x02);
    /// Line mentions the user.
    pub const HIGHLIGHT: Self = Self(0x04);

    /// Build from raw bits, dropping unknown ones.
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & 0x07)
    }

    /// Raw bits.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the bits of `other`.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl std::ops::BitOr for MessageFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Strip the `!user@host` part of a sender mask.
///
/// `"alice!foo@bar"` yields `"alice"`; a bare nick is returned unchanged.
pub fn nick_from_mask(mask: &str) -> &str {
    mask.split_once('!').map_or(mask, |(nick, _)| nick)
}

/// Rejected attempt to attach an unassigned id to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("storage returned unassigned message id {0}")]
pub struct InvalidMessageId(pub MessageId);

/// A message that has not been persisted yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewMessage {
    /// Receive time.
    pub timestamp: DateTime<Utc>,
    /// Destination buffer.
    pub buffer: BufferInfo,
    /// Kind of line.
    pub msg_type: MessageType,
    /// Flags.
    pub flags: MessageFlags,
    /// Sender mask, possibly empty.
    pub sender: String,
    /// Line text.
    pub text: String,
}

impl NewMessage {
    /// Draft a message stamped with the current time.
    pub fn new(
        buffer: BufferInfo,
        msg_type: MessageType,
        text: impl Into<String>,
        sender: impl Into<String>,
        flags: MessageFlags,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            buffer,
            msg_type,
            flags,
            sender: sender.into(),
            text: text.into(),
        }
    }

    /// Attach the storage-assigned id.
    pub fn into_persisted(self, id: MessageId) -> Result<Message, InvalidMessageId> {
        if !id.is_valid() {
            return Err(InvalidMessageId(id));
        }
        Ok(Message {
            id,
            timestamp: self.timestamp,
            buffer: self.buffer,
            msg_type: self.msg_type,
            flags: self.flags,
            sender: self.sender,
            text: self.text,
        })
    }
}

/// A persisted chat message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Storage-assigned id, never zero.
    pub id: MessageId,
    /// Receive time.
    pub timestamp: DateTime<Utc>,
    /// Buffer the message belongs to.
    pub buffer: BufferInfo,
    /// Kind of line.
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    /// Flags.
    pub flags: MessageFlags,
    /// Sender mask.
    pub sender: String,
    /// Line text.
    pub text: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{BufferId, NetworkId};
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    fn buffer() -> BufferInfo {
        BufferInfo {
            id: BufferId::new(1),
            network_id: NetworkId::new(1),
            network_name: "freenode".into(),
            name: "#rust".into(),
        }
    }

    #[test]
    fn nick_from_full_mask() {
        assert_eq!(nick_from_mask("alice!foo@bar"), "alice");
    }

    #[test]
    fn nick_from_bare_nick() {
        assert_eq!(nick_from_mask("alice"), "alice");
        assert_eq!(nick_from_mask(""), "");
    }

    proptest! {
        #[test]
        fn nick_never_contains_bang(nick in "[a-z]{1,9}", rest in "[a-z@.!]{0,12}") {
            let mask = format!("{nick}!{rest}");
            prop_assert_eq!(nick_from_mask(&mask), nick.as_str());
        }
    }

    #[test]
    fn flags_contains_and_insert() {
        let mut flags = MessageFlags::PRIVATE;
        assert!(flags.contains(MessageFlags::PRIVATE));
        assert!(!flags.contains(MessageFlags::SELF));
        flags.insert(MessageFlags::SELF);
        assert!(flags.contains(MessageFlags::PRIVATE | MessageFlags::SELF));
        assert_eq!(flags.bits(), 0x03);
    }

    #[test]
    fn flags_truncate_unknown_bits() {
        assert_eq!(MessageFlags::from_bits_truncate(0xff).bits(), 0x07);
    }

    #[test]
    fn message_type_codes_roundtrip() {
        for t in MessageType::ALL {
            assert_eq!(MessageType::from_code(t.code()), Some(t));
        }
        assert_eq!(MessageType::from_code(3), None);
    }

    #[test]
    fn into_persisted_rejects_zero_id() {
        let draft = NewMessage::new(buffer(), MessageType::Plain, "hi", "bob", MessageFlags::NONE);
        assert_matches!(draft.into_persisted(MessageId::new(0)), Err(InvalidMessageId(_)));
    }

    #[test]
    fn into_persisted_keeps_fields() {
        let draft = NewMessage::new(buffer(), MessageType::Notice, "hi", "bob", MessageFlags::SELF);
        let msg = draft.clone().into_persisted(MessageId::new(17)).unwrap();
        assert_eq!(msg.id, MessageId::new(17));
        assert_eq!(msg.text, draft.text);
        assert_eq!(msg.msg_type, MessageType::Notice);
        assert_eq!(msg.timestamp, draft.timestamp);
    }

    #[test]
    fn message_serializes_type_field() {
        let msg = NewMessage::new(buffer(), MessageType::Action, "waves", "bob", MessageFlags::NONE)
            .into_persisted(MessageId::new(2))
            .unwrap();
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "action");
        assert_eq!(value["id"], 2);
        assert_eq!(value["buffer"]["name"], "#rust");
    }
}

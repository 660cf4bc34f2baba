//! Numeric ID newtypes.
//!
//! Storage assigns every entity an integer row id. Each entity gets its own
//! newtype so a buffer id can never be passed where a network id is expected.
//! The value `0` is never issued by storage and is treated as "unassigned".

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw storage value.
            #[must_use]
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Return the raw storage value.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }

            /// Whether this id was issued by storage (non-zero).
            #[must_use]
            pub const fn is_valid(self) -> bool {
                self.0 != 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

numeric_id! {
    /// Identifier of the user owning a session.
    UserId
}

numeric_id! {
    /// Identifier of a chat network, resolved from its name by storage.
    NetworkId
}

numeric_id! {
    /// Identifier of a conversation buffer.
    BufferId
}

numeric_id! {
    /// Identifier of a persisted message.
    MessageId
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_invalid() {
        assert!(!MessageId::new(0).is_valid());
        assert!(!NetworkId::default().is_valid());
        assert!(BufferId::new(7).is_valid());
    }

    #[test]
    fn display_is_raw_number() {
        assert_eq!(NetworkId::new(42).to_string(), "42");
    }

    #[test]
    fn serde_is_transparent() {
        let json = serde_json::to_string(&UserId::new(3)).unwrap();
        assert_eq!(json, "3");
        let back: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, UserId::new(3));
    }

    #[test]
    fn ordering_follows_raw_value() {
        let mut ids = vec![MessageId::new(9), MessageId::new(2), MessageId::new(5)];
        ids.sort();
        assert_eq!(ids, vec![MessageId::new(2), MessageId::new(5), MessageId::new(9)]);
    }

    #[test]
    fn conversions() {
        let id: BufferId = 11_i64.into();
        let raw: i64 = id.into();
        assert_eq!(raw, 11);
    }
}

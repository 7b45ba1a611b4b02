//! Typed identifiers for messages, attachments, and playbacks.
//!
//! All ID types wrap UUIDv7 (time-ordered, globally unique), so two messages
//! created in the same millisecond still get distinct ids. They display as
//! standard UUID text for logging. The `short()` form (first 8 hex chars) is
//! for human-facing output, never used as a lookup key.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A timeline message identifier (UUIDv7).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(uuid::Uuid);

/// A pending or sent attachment identifier (UUIDv7).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttachmentId(uuid::Uuid);

/// Identifies one playback (one scripted assistant turn).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaybackId(uuid::Uuid);

// ── Shared behavior ─────────────────────────────────────────────────────────

macro_rules! impl_typed_id {
    ($T:ident, $name:literal) => {
        impl $T {
            /// Create a new time-ordered ID (UUIDv7).
            pub fn new() -> Self {
                Self(uuid::Uuid::now_v7())
            }

            /// First 8 hex characters, for human display only, not lookup.
            pub fn short(&self) -> String {
                self.0.as_simple().to_string()[..8].to_string()
            }
        }

        impl Default for $T {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                // Full UUID with hyphens for log readability
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $name, self.short())
            }
        }
    };
}

impl_typed_id!(MessageId, "MessageId");
impl_typed_id!(AttachmentId, "AttachmentId");
impl_typed_id!(PlaybackId, "PlaybackId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_ordered() {
        let a = MessageId::new();
        let b = MessageId::new();
        assert_ne!(a, b);
        // UUIDv7 sorts by creation time
        assert!(a < b);
    }

    #[test]
    fn test_short_is_display_prefix() {
        let id = AttachmentId::new();
        assert_eq!(id.short().len(), 8);
        assert!(id.to_string().starts_with(&id.short()));
    }

    #[test]
    fn test_debug_uses_short_form() {
        let id = MessageId::new();
        assert_eq!(format!("{:?}", id), format!("MessageId({})", id.short()));
    }

    #[test]
    fn test_serde_is_transparent() {
        let id = MessageId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }
}

//! Shared message, attachment, and scenario types for Iterate.
//!
//! This crate is the data model of the chat panel: typed IDs, timeline
//! messages, attachments with their preview resources, file-change cards, and
//! the scripted scenarios a playback replays. It has **no internal iterate
//! dependencies**: a pure leaf crate that the kernel builds on.
//!
//! # Key Types
//!
//! |--------------------|---------------------------------------------|
//! | Type               | Purpose                                     |
//! |--------------------|---------------------------------------------|
//! | [`Message`]        | One timeline entry (user or assistant)      |
//! | [`ChangeSet`]      | Placeholder spinner or a file-change burst  |
//! | [`FileChange`]     | A simulated edit with change-log lines      |
//! | [`Attachment`]     | A file sent with (or pending for) a message |
//! | [`PreviewHandle`]  | Ref-counted external preview resource       |
//! | [`Scenario`]       | Scripted steps plus a summary               |
//! | [`MessageId`]      | Which message                               |
//! | [`AttachmentId`]   | Which attachment                            |
//! | [`PlaybackId`]     | Which scripted assistant turn               |
//! |--------------------|---------------------------------------------|

pub mod attachment;
pub mod ids;
pub mod message;
pub mod scenario;

// Re-export primary types at crate root for convenience.
pub use attachment::{
    ACCEPTED_FILE_TYPES, Attachment, PASTED_IMAGE_NAME, PreviewHandle, PreviewRelease,
    RawAttachment, is_accepted, is_image,
};
pub use ids::{AttachmentId, MessageId, PlaybackId};
pub use message::{ChangeSet, FileAction, FileChange, Message, Role};
pub use scenario::{Scenario, ScenarioStep};

/// Current time as Unix milliseconds. Used by constructors throughout the crate.
pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

//! Timeline messages and the file-change cards they carry.
//!
//! ## Design: ChangeSet
//!
//! The transient "thinking" indicator is its own variant,
//! [`ChangeSet::Placeholder`], rather than a file change with a magic id. A
//! scenario file change may use any id (including `"thinking"`) without being
//! mistaken for the indicator.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::attachment::Attachment;
use crate::ids::MessageId;

/// Author of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum Role {
    /// Person at the keyboard.
    #[default]
    #[strum(serialize = "user", serialize = "human")]
    User,
    /// The simulated coding assistant.
    #[strum(serialize = "assistant", serialize = "model")]
    Assistant,
}

impl Role {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a simulated edit does to its file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum FileAction {
    #[default]
    Creating,
    #[strum(serialize = "modifying", serialize = "editing")]
    Modifying,
    Deleting,
}

impl FileAction {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileAction::Creating => "creating",
            FileAction::Modifying => "modifying",
            FileAction::Deleting => "deleting",
        }
    }
}

impl std::fmt::Display for FileAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A simulated edit to a named file, with its change-log lines.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub id: String,
    /// May be empty.
    pub filename: String,
    pub action: FileAction,
    /// Diff/log lines, revealed one by one while loading.
    #[serde(default)]
    pub changes: Vec<String>,
    #[serde(default)]
    pub is_loading: bool,
}

impl FileChange {
    pub fn new(
        id: impl Into<String>,
        filename: impl Into<String>,
        action: FileAction,
        changes: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
            action,
            changes,
            is_loading: true,
        }
    }

    /// Same change, already fully revealed.
    pub fn loaded(mut self) -> Self {
        self.is_loading = false;
        self
    }
}

/// File-change payload of an assistant message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "changes", rename_all = "snake_case")]
pub enum ChangeSet {
    /// Generic "thinking" spinner shown while a playback warms up.
    Placeholder,
    /// One or more file-change cards appended together.
    Burst(Vec<FileChange>),
}

impl ChangeSet {
    /// File changes in this set (none for the placeholder).
    pub fn changes(&self) -> &[FileChange] {
        match self {
            ChangeSet::Placeholder => &[],
            ChangeSet::Burst(changes) => changes,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, ChangeSet::Placeholder)
    }
}

/// One entry in the timeline.
///
/// Every message has non-empty content, attachments, or file changes, except
/// the transient placeholder, which has none of them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    /// Creation time (Unix millis).
    pub timestamp: u64,
    /// Present only on user messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
    /// Present only on assistant messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_changes: Option<ChangeSet>,
}

impl Message {
    fn base(role: Role, content: String) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content,
            timestamp: crate::now_millis(),
            attachments: None,
            file_changes: None,
        }
    }

    /// A user message. An empty attachment list is stored as `None`.
    pub fn user(content: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        let mut msg = Self::base(Role::User, content.into());
        if !attachments.is_empty() {
            msg.attachments = Some(attachments);
        }
        msg
    }

    /// A plain assistant text message (thinking note, summary, greeting).
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::base(Role::Assistant, content.into())
    }

    /// An assistant message carrying a burst of file-change cards.
    pub fn file_changes(changes: Vec<FileChange>) -> Self {
        let mut msg = Self::base(Role::Assistant, String::new());
        msg.file_changes = Some(ChangeSet::Burst(changes));
        msg
    }

    /// The transient "thinking" indicator.
    pub fn placeholder() -> Self {
        let mut msg = Self::base(Role::Assistant, String::new());
        msg.file_changes = Some(ChangeSet::Placeholder);
        msg
    }

    pub fn is_placeholder(&self) -> bool {
        self.file_changes.as_ref().is_some_and(ChangeSet::is_placeholder)
    }

    /// True when the message carries nothing to render.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
            && self.attachments.as_ref().is_none_or(Vec::is_empty)
            && self
                .file_changes
                .as_ref()
                .is_none_or(|set| set.changes().is_empty())
    }

    /// Burst file changes (empty for text messages and the placeholder).
    pub fn changes(&self) -> &[FileChange] {
        self.file_changes.as_ref().map_or(&[], ChangeSet::changes)
    }

    /// Reset the timestamp to now. Used when a prepared message is appended later.
    pub fn stamp_now(&mut self) {
        self.timestamp = crate::now_millis();
    }
}

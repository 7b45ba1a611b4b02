//! Error types for the panel core.
//!
//! Capacity violations are the only error a user ever sees; the rest guard
//! timeline invariants and file loading.

use thiserror::Error;

use iterate_types::MessageId;

/// Errors from the pending attachment store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttachmentError {
    /// The store already holds the maximum number of attachments.
    #[error("you can attach at most {max} files per message")]
    CapacityExceeded { max: usize },
}

/// Errors from timeline mutations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimelineError {
    /// Message has no content, attachments, or file changes.
    #[error("refusing to append empty message {0:?}")]
    EmptyMessage(MessageId),

    /// No message with this id.
    #[error("message not found: {0:?}")]
    NotFound(MessageId),

    /// Only placeholders may be removed; everything else is append-only.
    #[error("message {0:?} is not a placeholder")]
    NotPlaceholder(MessageId),
}

/// Errors loading a scenario catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// A catalog must offer at least one scenario to choose from.
    #[error("scenario catalog is empty")]
    Empty,

    #[error("failed to read scenario catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid scenario catalog: {0}")]
    Parse(String),
}

/// Errors loading or editing panel configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {message}")]
    Parse { path: String, message: String },

    #[error("failed to serialize config: {0}")]
    Serialize(String),

    #[error("unknown feature flag: {0}")]
    UnknownFlag(String),
}

//! Attachments and their preview resources.
//!
//! An [`Attachment`] is a file the user pasted or picked before sending. Image
//! attachments carry a [`PreviewHandle`], an externally allocated resource
//! (a blob URL in a browser) that must be released exactly once.
//!
//! ## Ownership
//!
//! The handle is reference counted. The pending store holds one reference;
//! sending *moves* the attachment into the timeline message, so the count does
//! not change and nothing is released. Cloning a message for a render snapshot
//! adds a reference. The resource is released when the last reference drops,
//! which makes double-release and release-while-referenced unrepresentable.

use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::ids::AttachmentId;

/// File types offered by the attachment picker.
pub const ACCEPTED_FILE_TYPES: &str = "image/*,.pdf,.doc,.docx,.txt";

/// Name given to a pasted image that arrives without one.
pub const PASTED_IMAGE_NAME: &str = "pasted-image.png";

/// Check whether a MIME type is an image (and so gets a preview resource).
pub fn is_image(mime_type: &str) -> bool {
    mime_type.starts_with("image/")
}

/// Check whether a file name / MIME pair passes the [`ACCEPTED_FILE_TYPES`] filter.
pub fn is_accepted(name: &str, mime_type: &str) -> bool {
    if is_image(mime_type) {
        return true;
    }
    let lower = name.to_ascii_lowercase();
    ACCEPTED_FILE_TYPES
        .split(',')
        .filter(|t| t.starts_with('.'))
        .any(|ext| lower.ends_with(ext))
}

// ============================================================================
// Preview resources
// ============================================================================

/// Releases preview resources back to whatever allocated them.
pub trait PreviewRelease: Send + Sync {
    /// Release the resource identified by `url`. Called at most once per url.
    fn release(&self, url: &str);
}

struct PreviewLease {
    url: String,
    releaser: Arc<dyn PreviewRelease>,
}

impl Drop for PreviewLease {
    fn drop(&mut self) {
        self.releaser.release(&self.url);
    }
}

/// Shared reference to a live preview resource.
///
/// The resource is released when the last clone is dropped.
#[derive(Clone)]
pub struct PreviewHandle(Arc<PreviewLease>);

impl PreviewHandle {
    /// Wrap a freshly allocated resource.
    pub fn new(url: impl Into<String>, releaser: Arc<dyn PreviewRelease>) -> Self {
        Self(Arc::new(PreviewLease {
            url: url.into(),
            releaser,
        }))
    }

    /// The resource locator (e.g. `blob:` URL) for rendering.
    pub fn url(&self) -> &str {
        &self.0.url
    }

    /// Number of live references (pending entry, messages, snapshots).
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl PartialEq for PreviewHandle {
    fn eq(&self, other: &Self) -> bool {
        self.url() == other.url()
    }
}

impl Eq for PreviewHandle {}

impl fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PreviewHandle({})", self.url())
    }
}

impl Serialize for PreviewHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.url())
    }
}

// ============================================================================
// Attachments
// ============================================================================

/// Raw bytes and metadata from a paste or file-select event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawAttachment {
    pub name: String,
    pub byte_size: u64,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl RawAttachment {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            byte_size: bytes.len() as u64,
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Pick the attachment out of a clipboard paste.
    ///
    /// Only the first image item is taken; text and other items are left to
    /// the text input. An unnamed image becomes [`PASTED_IMAGE_NAME`].
    pub fn from_clipboard(items: impl IntoIterator<Item = RawAttachment>) -> Option<Self> {
        let mut item = items.into_iter().find(|i| is_image(&i.mime_type))?;
        if item.name.is_empty() {
            item.name = PASTED_IMAGE_NAME.to_string();
        }
        Some(item)
    }

    pub fn is_image(&self) -> bool {
        is_image(&self.mime_type)
    }
}

/// A pending or sent attachment.
///
/// `preview` is present iff the MIME type is an image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub id: AttachmentId,
    pub name: String,
    pub byte_size: u64,
    pub mime_type: String,
    #[serde(rename = "preview_url", skip_serializing_if = "Option::is_none")]
    pub preview: Option<PreviewHandle>,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        is_image(&self.mime_type)
    }
}

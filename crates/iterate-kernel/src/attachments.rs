//! Pending attachment store.
//!
//! Holds the attachments the user has added but not yet sent, in arrival
//! order, capped at [`MAX_PENDING_ATTACHMENTS`]. Image attachments get a
//! preview resource from the [`PreviewBackend`] on `add`.
//!
//! Removing an attachment drops the store's [`PreviewHandle`], which releases
//! the resource. Sending uses [`AttachmentStore::drain_for_send`], which
//! *moves* the attachments out: the handles travel into the timeline message
//! and nothing is released.

use std::sync::Arc;

use iterate_types::{Attachment, AttachmentId, PreviewHandle, PreviewRelease, RawAttachment};

use crate::error::AttachmentError;
use crate::preview::PreviewBackend;

/// Maximum number of pending attachments per message.
pub const MAX_PENDING_ATTACHMENTS: usize = 3;

/// Attachments waiting to be sent.
pub struct AttachmentStore {
    pending: Vec<Attachment>,
    allocator: Arc<dyn PreviewBackend>,
    releaser: Arc<dyn PreviewRelease>,
}

impl AttachmentStore {
    /// Create an empty store allocating previews from `backend`.
    pub fn new<B: PreviewBackend + 'static>(backend: Arc<B>) -> Self {
        Self {
            pending: Vec::new(),
            allocator: backend.clone(),
            releaser: backend,
        }
    }

    /// Admit a new attachment.
    ///
    /// Fails without touching the store (or allocating anything) when
    /// [`MAX_PENDING_ATTACHMENTS`] are already pending.
    pub fn add(&mut self, raw: RawAttachment) -> Result<AttachmentId, AttachmentError> {
        if self.pending.len() >= MAX_PENDING_ATTACHMENTS {
            tracing::warn!(name = %raw.name, "attachment rejected: store full");
            return Err(AttachmentError::CapacityExceeded {
                max: MAX_PENDING_ATTACHMENTS,
            });
        }

        let preview = raw.is_image().then(|| {
            let url = self.allocator.allocate(&raw);
            PreviewHandle::new(url, self.releaser.clone())
        });
        let attachment = Attachment {
            id: AttachmentId::new(),
            name: raw.name,
            byte_size: raw.byte_size,
            mime_type: raw.mime_type,
            preview,
        };
        let id = attachment.id;
        tracing::debug!(attachment = %id, name = %attachment.name, "attachment added");
        self.pending.push(attachment);
        Ok(id)
    }

    /// Remove a pending attachment, releasing its preview.
    ///
    /// Returns `false` (and does nothing) if `id` is not pending.
    pub fn remove(&mut self, id: AttachmentId) -> bool {
        let Some(pos) = self.pending.iter().position(|a| a.id == id) else {
            return false;
        };
        let removed = self.pending.remove(pos);
        tracing::debug!(attachment = %id, "attachment removed");
        // Dropping the last handle releases the preview.
        drop(removed);
        true
    }

    /// Take every pending attachment for sending, leaving the store empty.
    ///
    /// Ownership moves to the caller; no preview is released.
    pub fn drain_for_send(&mut self) -> Vec<Attachment> {
        std::mem::take(&mut self.pending)
    }

    /// Pending attachments in arrival order.
    pub fn pending(&self) -> &[Attachment] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl std::fmt::Debug for AttachmentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentStore")
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::BlobUrlBackend;

    fn store() -> (AttachmentStore, Arc<BlobUrlBackend>) {
        let backend = Arc::new(BlobUrlBackend::new());
        (AttachmentStore::new(backend.clone()), backend)
    }

    fn image(name: &str) -> RawAttachment {
        RawAttachment::new(name, "image/png", vec![1, 2, 3])
    }

    fn pdf(name: &str) -> RawAttachment {
        RawAttachment::new(name, "application/pdf", vec![4, 5])
    }

    // ── Capacity ────────────────────────────────────────────────────────

    #[test]
    fn test_fourth_add_fails_without_mutation() {
        let (mut store, backend) = store();
        for i in 0..3 {
            store.add(image(&format!("{i}.png"))).unwrap();
        }
        let before: Vec<_> = store.pending().iter().map(|a| a.id).collect();

        let err = store.add(image("4.png")).unwrap_err();
        assert_eq!(err, AttachmentError::CapacityExceeded { max: 3 });

        let after: Vec<_> = store.pending().iter().map(|a| a.id).collect();
        assert_eq!(before, after);
        // Rejected add never allocated a preview
        assert_eq!(backend.allocated_count(), 3);
    }

    #[test]
    fn test_capacity_frees_after_remove() {
        let (mut store, _) = store();
        let first = store.add(pdf("a.pdf")).unwrap();
        store.add(pdf("b.pdf")).unwrap();
        store.add(pdf("c.pdf")).unwrap();
        assert!(store.add(pdf("d.pdf")).is_err());

        assert!(store.remove(first));
        store.add(pdf("d.pdf")).unwrap();
        let names: Vec<_> = store.pending().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["b.pdf", "c.pdf", "d.pdf"]);
    }

    // ── Preview lifecycle ───────────────────────────────────────────────

    #[test]
    fn test_only_images_get_previews() {
        let (mut store, backend) = store();
        store.add(image("a.png")).unwrap();
        store.add(pdf("b.pdf")).unwrap();
        assert!(store.pending()[0].preview.is_some());
        assert!(store.pending()[1].preview.is_none());
        assert_eq!(backend.live_count(), 1);
    }

    #[test]
    fn test_remove_releases_exactly_once() {
        let (mut store, backend) = store();
        let id = store.add(image("a.png")).unwrap();
        let url = store.pending()[0].preview.as_ref().unwrap().url().to_string();

        assert!(store.remove(id));
        assert!(!backend.is_live(&url));
        assert_eq!(backend.released_count(), 1);

        // Second remove is a no-op
        assert!(!store.remove(id));
        assert_eq!(backend.released_count(), 1);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let (mut store, _) = store();
        store.add(pdf("a.pdf")).unwrap();
        assert!(!store.remove(AttachmentId::new()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_drain_transfers_without_release() {
        let (mut store, backend) = store();
        store.add(image("a.png")).unwrap();
        store.add(pdf("b.pdf")).unwrap();

        let sent = store.drain_for_send();
        assert!(store.is_empty());
        assert_eq!(sent.len(), 2);
        assert_eq!(backend.live_count(), 1);
        assert_eq!(backend.released_count(), 0);

        // Released once the sent copy is gone
        drop(sent);
        assert_eq!(backend.live_count(), 0);
        assert_eq!(backend.released_count(), 1);
    }

    #[test]
    fn test_drain_empty_store() {
        let (mut store, _) = store();
        assert!(store.drain_for_send().is_empty());
    }

    #[test]
    fn test_drain_then_add_uses_fresh_resource() {
        let (mut store, backend) = store();
        store.add(image("a.png")).unwrap();
        let sent = store.drain_for_send();
        store.add(image("a.png")).unwrap();

        let old = sent[0].preview.as_ref().unwrap();
        let new = store.pending()[0].preview.as_ref().unwrap();
        assert_ne!(old.url(), new.url());
        assert_ne!(sent[0].id, store.pending()[0].id);
        assert_eq!(backend.live_count(), 2);
    }
}

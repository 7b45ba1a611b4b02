//! Preview resource allocation.
//!
//! A browser host would back this with `URL.createObjectURL` /
//! `URL.revokeObjectURL`. [`BlobUrlBackend`] is the in-process stand-in: it
//! mints unique `blob:` URLs and tracks which ones are live, so leaks and
//! double releases are observable.

use std::collections::HashSet;

use parking_lot::Mutex;

use iterate_types::{PreviewRelease, RawAttachment};

/// Allocates preview resources for image attachments.
pub trait PreviewBackend: PreviewRelease {
    /// Allocate a resource for `raw` and return its URL.
    fn allocate(&self, raw: &RawAttachment) -> String;
}

#[derive(Debug, Default)]
struct Ledger {
    live: HashSet<String>,
    allocated: u64,
    released: u64,
}

/// In-memory blob URL allocator.
#[derive(Debug, Default)]
pub struct BlobUrlBackend {
    ledger: Mutex<Ledger>,
}

impl BlobUrlBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resources allocated and not yet released.
    pub fn live_count(&self) -> usize {
        self.ledger.lock().live.len()
    }

    pub fn is_live(&self, url: &str) -> bool {
        self.ledger.lock().live.contains(url)
    }

    pub fn allocated_count(&self) -> u64 {
        self.ledger.lock().allocated
    }

    pub fn released_count(&self) -> u64 {
        self.ledger.lock().released
    }
}

impl PreviewRelease for BlobUrlBackend {
    fn release(&self, url: &str) {
        let mut ledger = self.ledger.lock();
        if ledger.live.remove(url) {
            ledger.released += 1;
            tracing::trace!(url, "preview released");
        } else {
            tracing::warn!(url, "release of unknown preview resource");
        }
    }
}

impl PreviewBackend for BlobUrlBackend {
    fn allocate(&self, raw: &RawAttachment) -> String {
        let url = format!("blob:iterate/{}", uuid::Uuid::new_v4());
        let mut ledger = self.ledger.lock();
        ledger.live.insert(url.clone());
        ledger.allocated += 1;
        tracing::trace!(url = %url, name = %raw.name, "preview allocated");
        url
    }
}

//! Preview handles: display-only resources derived from image payloads.
//!
//! A [`PreviewHandle`] is a scoped resource: it is allocated from a
//! [`PreviewStore`] and released back to it exactly once, when the handle is
//! dropped.  Removing an image, resetting the batch and tearing down the
//! whole manager all release through the same `Drop` path, so no handle can
//! leak or be released twice.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::payload::ImagePayload;

// ---------------------------------------------------------------------------
// PreviewId
// ---------------------------------------------------------------------------

/// Opaque identifier the view layer uses to look a preview up.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreviewId(String);

impl PreviewId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PreviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// PreviewStore
// ---------------------------------------------------------------------------

/// Allocator for preview resources.
///
/// Implementations must be `Send + Sync`; the session shares one store
/// between the media manager and the view layer.
pub trait PreviewStore: Send + Sync {
    /// Allocate a fresh preview for `payload`.
    fn allocate(&self, payload: &ImagePayload) -> PreviewId;

    /// Release a preview previously returned by [`allocate`](Self::allocate).
    fn release(&self, id: &PreviewId);
}

// ---------------------------------------------------------------------------
// PreviewHandle
// ---------------------------------------------------------------------------

/// RAII guard for one allocated preview.  Dropping it releases the preview.
pub struct PreviewHandle {
    id: PreviewId,
    store: Arc<dyn PreviewStore>,
}

impl PreviewHandle {
    pub fn allocate(store: &Arc<dyn PreviewStore>, payload: &ImagePayload) -> Self {
        let id = store.allocate(payload);
        Self {
            id,
            store: Arc::clone(store),
        }
    }

    pub fn id(&self) -> &PreviewId {
        &self.id
    }
}

impl fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.store.release(&self.id);
    }
}

// ---------------------------------------------------------------------------
// MemoryPreviewStore
// ---------------------------------------------------------------------------

/// In-process preview store.
///
/// Ids look like `preview://7`; [`get`](Self::get) resolves them to the
/// image bytes for rendering.  Allocation and release counters are kept for
/// diagnostics.
#[derive(Default)]
pub struct MemoryPreviewStore {
    next_id: AtomicU64,
    live: Mutex<HashMap<PreviewId, Arc<[u8]>>>,
    allocated: AtomicUsize,
    released: AtomicUsize,
}

impl MemoryPreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes behind a live preview, or `None` once it has been released.
    pub fn get(&self, id: &PreviewId) -> Option<Arc<[u8]>> {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Number of previews currently allocated and not yet released.
    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn allocated_count(&self) -> usize {
        self.allocated.load(Ordering::SeqCst)
    }

    pub fn released_count(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl PreviewStore for MemoryPreviewStore {
    fn allocate(&self, payload: &ImagePayload) -> PreviewId {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let id = PreviewId(format!("preview://{n}"));
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), payload.shared_data());
        self.allocated.fetch_add(1, Ordering::SeqCst);
        id
    }

    fn release(&self, id: &PreviewId) {
        let removed = self
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        match removed {
            Some(_) => {
                self.released.fetch_add(1, Ordering::SeqCst);
            }
            None => log::warn!("media: release of unknown preview {id}"),
        }
    }
}

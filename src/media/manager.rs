//! The ordered batch of selected images and its preview lifecycles.
//!
//! Each [`CapturedImage`] pairs a payload with its preview handle, so the
//! payload sequence and the preview sequence can never drift apart: they are
//! the same `Vec`.

use std::sync::Arc;

use super::payload::{ImagePayload, MediaError};
use super::preview::{PreviewHandle, PreviewId, PreviewStore};

/// One selected image plus its preview.
#[derive(Debug)]
pub struct CapturedImage {
    payload: ImagePayload,
    preview: PreviewHandle,
}

impl CapturedImage {
    pub fn payload(&self) -> &ImagePayload {
        &self.payload
    }

    pub fn preview_id(&self) -> &PreviewId {
        self.preview.id()
    }
}

/// Ordered, index-stable sequence of captured images.
pub type ImageBatch = [CapturedImage];

/// Owns the image batch.
///
/// ```rust
/// use std::sync::Arc;
/// use setu_client::media::{ImagePayload, MediaCaptureManager, MemoryPreviewStore};
///
/// let store = Arc::new(MemoryPreviewStore::new());
/// let mut media = MediaCaptureManager::new(store.clone());
///
/// media.add_files([
///     ImagePayload::from_bytes("front.jpg", vec![1u8]),
///     ImagePayload::from_bytes("back.jpg", vec![2u8]),
/// ]);
/// media.remove_file(0).unwrap();
///
/// assert_eq!(media.len(), 1);
/// assert_eq!(store.released_count(), 1);
/// ```
pub struct MediaCaptureManager {
    store: Arc<dyn PreviewStore>,
    images: Vec<CapturedImage>,
}

impl MediaCaptureManager {
    pub fn new(store: Arc<dyn PreviewStore>) -> Self {
        Self {
            store,
            images: Vec::new(),
        }
    }

    /// Append `files` in order, allocating one preview per file.
    ///
    /// Returns the number of images appended.
    pub fn add_files<I>(&mut self, files: I) -> usize
    where
        I: IntoIterator<Item = ImagePayload>,
    {
        let before = self.images.len();
        for payload in files {
            let preview = PreviewHandle::allocate(&self.store, &payload);
            self.images.push(CapturedImage { payload, preview });
        }
        let added = self.images.len() - before;
        log::debug!("media: added {added} image(s), batch size {}", self.images.len());
        added
    }

    /// Remove the image at `index`, releasing its preview.
    ///
    /// Later images shift down by one.  Returns the removed payload.
    pub fn remove_file(&mut self, index: usize) -> Result<ImagePayload, MediaError> {
        if index >= self.images.len() {
            return Err(MediaError::IndexOutOfRange {
                index,
                len: self.images.len(),
            });
        }

        let CapturedImage { payload, preview } = self.images.remove(index);
        drop(preview);

        log::debug!("media: removed image {index}, batch size {}", self.images.len());
        Ok(payload)
    }

    /// Release every preview and empty the batch.
    pub fn reset(&mut self) {
        let count = self.images.len();
        self.images.clear();
        if count > 0 {
            log::debug!("media: reset released {count} preview(s)");
        }
    }

    pub fn batch(&self) -> &ImageBatch {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CapturedImage> {
        self.images.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CapturedImage> {
        self.images.iter()
    }

    /// Snapshot of the payloads only, in batch order.
    pub fn payloads(&self) -> Vec<ImagePayload> {
        self.images.iter().map(|img| img.payload.clone()).collect()
    }

    pub fn preview_ids(&self) -> Vec<PreviewId> {
        self.images.iter().map(|img| img.preview_id().clone()).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

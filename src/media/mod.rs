//! Image selection: payloads, preview handles and the ordered batch.
//!
//! ```text
//! add_files ──▶ ImagePayload ──allocate──▶ PreviewHandle ──▶ CapturedImage
//!                                                   │
//! remove_file / reset / drop ───────release─────────┘
//! ```

pub mod manager;
pub mod payload;
pub mod preview;

pub use manager::{CapturedImage, ImageBatch, MediaCaptureManager};
pub use payload::{mime_for_path, ImagePayload, MediaError};
pub use preview::{MemoryPreviewStore, PreviewHandle, PreviewId, PreviewStore};

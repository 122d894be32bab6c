//! Binary image payloads selected by the user.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

// ---------------------------------------------------------------------------
// MediaError
// ---------------------------------------------------------------------------

/// Errors raised by the media layer.
#[derive(Debug, Error)]
pub enum MediaError {
    /// `remove_file` was called with an index outside the current batch.
    /// This is a caller bug, not an environment failure.
    #[error("image index {index} is out of range (batch has {len} images)")]
    IndexOutOfRange { index: usize, len: usize },

    /// An image file could not be read from disk.
    #[error("failed to read image {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// ImagePayload
// ---------------------------------------------------------------------------

/// One selected image: its original file name, MIME type and bytes.
///
/// The bytes are shared (`Arc<[u8]>`) so snapshotting a batch for submission
/// never copies image data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    file_name: String,
    mime_type: String,
    data: Arc<[u8]>,
}

impl ImagePayload {
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        data: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Build a payload whose MIME type is inferred from `file_name`.
    pub fn from_bytes(file_name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        let file_name = file_name.into();
        let mime_type = mime_for_path(Path::new(&file_name));
        Self::new(file_name, mime_type, data)
    }

    /// Read an image file from disk.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, MediaError> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await.map_err(|source| MediaError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        log::debug!("media: loaded {} ({} bytes)", path.display(), data.len());
        Ok(Self::new(file_name, mime_for_path(path), data))
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Shared handle to the bytes.
    pub fn shared_data(&self) -> Arc<[u8]> {
        Arc::clone(&self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// MIME type for an image path, by extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("heic") => "image/heic",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_from_extension_is_case_insensitive() {
        assert_eq!(mime_for_path(Path::new("shawl.JPG")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("bag.jpeg")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("lamp.png")), "image/png");
        assert_eq!(mime_for_path(Path::new("pot.HEIC")), "image/heic");
    }

    #[test]
    fn unknown_extension_is_octet_stream() {
        assert_eq!(mime_for_path(Path::new("notes.txt")), "application/octet-stream");
        assert_eq!(mime_for_path(Path::new("no_extension")), "application/octet-stream");
    }

    #[test]
    fn clones_share_bytes() {
        let a = ImagePayload::from_bytes("a.png", vec![1u8, 2, 3]);
        let b = a.clone();
        assert!(Arc::ptr_eq(&a.shared_data(), &b.shared_data()));
        assert_eq!(b.mime_type(), "image/png");
        assert_eq!(b.len(), 3);
    }

    #[tokio::test]
    async fn load_reads_file_name_and_bytes() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("kurta.webp");
        std::fs::write(&path, b"RIFF....WEBP").expect("write");

        let payload = ImagePayload::load(&path).await.expect("load");
        assert_eq!(payload.file_name(), "kurta.webp");
        assert_eq!(payload.mime_type(), "image/webp");
        assert_eq!(payload.data(), b"RIFF....WEBP");
    }

    #[tokio::test]
    async fn load_missing_file_reports_path() {
        let err = ImagePayload::load("/nonexistent/photo.jpg").await.unwrap_err();
        assert!(matches!(err, MediaError::Read { .. }));
        assert!(err.to_string().contains("/nonexistent/photo.jpg"));
    }
}

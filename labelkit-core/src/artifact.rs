//! Object URLs for downloaded render artifacts

use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::{LabelError, Result};

/// Viewer directive appended to PDF object URLs
pub const PDF_VIEW_DIRECTIVE: &str = "#view=fitH";

/// A render artifact registered under an object URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewArtifact {
    pub object_url: String,
    pub content_type: String,
    pub size: usize,
}

impl PreviewArtifact {
    pub fn is_pdf(&self) -> bool {
        self.content_type
            .split(';')
            .next()
            .map(|mime| mime.trim().eq_ignore_ascii_case("application/pdf"))
            .unwrap_or(false)
    }

    /// URL handed to the embedded viewer
    pub fn display_url(&self) -> String {
        if self.is_pdf() {
            format!("{}{}", self.object_url, PDF_VIEW_DIRECTIVE)
        } else {
            self.object_url.clone()
        }
    }
}

struct Blob {
    bytes: Vec<u8>,
    content_type: String,
}

/// In-memory registry of artifact blobs addressed by `blob:` URLs
#[derive(Default)]
pub struct ObjectUrlStore {
    blobs: Mutex<HashMap<String, Blob>>,
}

impl ObjectUrlStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a blob and return its artifact descriptor
    pub fn create(&self, bytes: Vec<u8>, content_type: &str) -> Result<PreviewArtifact> {
        let object_url = format!("blob:labelkit/{}", Uuid::new_v4());
        let size = bytes.len();

        self.lock()?.insert(
            object_url.clone(),
            Blob {
                bytes,
                content_type: content_type.to_string(),
            },
        );

        Ok(PreviewArtifact {
            object_url,
            content_type: content_type.to_string(),
            size,
        })
    }

    /// Release a blob; unknown URLs are ignored
    pub fn revoke(&self, object_url: &str) -> Result<()> {
        if self.lock()?.remove(object_url).is_some() {
            tracing::debug!("Revoked object URL {}", object_url);
        }
        Ok(())
    }

    /// Bytes and content type behind an object URL
    pub fn read(&self, object_url: &str) -> Result<Option<(Vec<u8>, String)>> {
        let url = object_url.split('#').next().unwrap_or(object_url);
        Ok(self
            .lock()?
            .get(url)
            .map(|blob| (blob.bytes.clone(), blob.content_type.clone())))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|blobs| blobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Blob>>> {
        self.blobs
            .lock()
            .map_err(|_| LabelError::state("Object URL store lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_display_url_gets_fit_directive() {
        let store = ObjectUrlStore::new();
        let pdf = store.create(b"%PDF-1.7".to_vec(), "application/pdf").unwrap();
        assert!(pdf.display_url().ends_with("#view=fitH"));
        assert!(pdf.object_url.starts_with("blob:labelkit/"));

        let png = store.create(vec![0x89, 0x50], "image/png").unwrap();
        assert_eq!(png.display_url(), png.object_url);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_revoke_and_read() {
        let store = ObjectUrlStore::new();
        let artifact = store
            .create(b"data".to_vec(), "application/pdf; charset=binary")
            .unwrap();
        assert!(artifact.is_pdf());

        let (bytes, content_type) = store.read(&artifact.display_url()).unwrap().unwrap();
        assert_eq!(bytes, b"data");
        assert_eq!(content_type, "application/pdf; charset=binary");

        store.revoke(&artifact.object_url).unwrap();
        assert!(store.is_empty());
        assert!(store.read(&artifact.object_url).unwrap().is_none());
    }
}

//! Photo storage collaborator
//!
//! Photos are opaque references (`<uuid>.<ext>`) to the rest of the crate.
//! The bundled [`LocalPhotoStore`] keeps files in `<root>/photos` and hands
//! out URLs under `<public_base_url>/photos/`, which the HTTP server serves.

use async_trait::async_trait;
use psm_common::{Error, Result};
use std::path::PathBuf;
use uuid::Uuid;

use crate::providers::ImagePayload;

/// Upload size cap
pub const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;

/// Reference returned by an upload
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StoredPhoto {
    pub photo_id: String,
    pub mime_type: String,
    pub url: String,
}

/// Storage for sighting photos
#[async_trait]
pub trait PhotoStore: Send + Sync {
    /// Accept new photo bytes and return a reference
    async fn upload(&self, bytes: Vec<u8>) -> Result<StoredPhoto>;

    /// Fetchable URL for a stored photo, `None` when it cannot be resolved
    async fn resolve_url(&self, photo_id: &str) -> Option<String>;

    /// Load the photo bytes
    async fn fetch(&self, photo_id: &str) -> Result<ImagePayload>;
}

/// Detect an image MIME type from content
pub fn detect_image(bytes: &[u8]) -> Result<infer::Type> {
    if bytes.is_empty() {
        return Err(Error::InvalidInput("Photo is empty".to_string()));
    }
    if bytes.len() > MAX_PHOTO_BYTES {
        return Err(Error::InvalidInput(format!(
            "Photo exceeds {} bytes",
            MAX_PHOTO_BYTES
        )));
    }
    match infer::get(bytes) {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Image => Ok(kind),
        Some(kind) => Err(Error::InvalidInput(format!(
            "Unsupported photo type: {}",
            kind.mime_type()
        ))),
        None => Err(Error::InvalidInput("Photo is not a recognizable image".to_string())),
    }
}

/// Photo store on the local filesystem
#[derive(Debug, Clone)]
pub struct LocalPhotoStore {
    dir: PathBuf,
    public_base_url: String,
}

impl LocalPhotoStore {
    pub fn new(dir: PathBuf, public_base_url: &str) -> Self {
        Self {
            dir,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Map a reference to its file, rejecting anything but `<uuid>.<ext>`
    fn path_for(&self, photo_id: &str) -> Option<PathBuf> {
        let (stem, ext) = photo_id.split_once('.')?;
        Uuid::parse_str(stem).ok()?;
        if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(self.dir.join(photo_id))
    }

    fn url_for(&self, photo_id: &str) -> String {
        format!("{}/photos/{}", self.public_base_url, photo_id)
    }
}

#[async_trait]
impl PhotoStore for LocalPhotoStore {
    async fn upload(&self, bytes: Vec<u8>) -> Result<StoredPhoto> {
        let kind = detect_image(&bytes)?;
        let photo_id = format!("{}.{}", Uuid::new_v4(), kind.extension());

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(&photo_id);
        let tmp_path = self.dir.join(format!("{}.part", photo_id));
        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, &path).await?;

        tracing::info!(photo_id = %photo_id, bytes = bytes.len(), mime = kind.mime_type(), "Stored photo");

        Ok(StoredPhoto {
            url: self.url_for(&photo_id),
            photo_id,
            mime_type: kind.mime_type().to_string(),
        })
    }

    async fn resolve_url(&self, photo_id: &str) -> Option<String> {
        let path = self.path_for(photo_id)?;
        match tokio::fs::try_exists(&path).await {
            Ok(true) => Some(self.url_for(photo_id)),
            _ => None,
        }
    }

    async fn fetch(&self, photo_id: &str) -> Result<ImagePayload> {
        let path = self
            .path_for(photo_id)
            .ok_or_else(|| Error::InvalidInput(format!("Invalid photo reference '{}'", photo_id)))?;

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!("Photo {}", photo_id)));
            }
            Err(e) => return Err(e.into()),
        };

        let mime_type = infer::get(&bytes)
            .map(|kind| kind.mime_type().to_string())
            .unwrap_or_else(|| "image/jpeg".to_string());
        Ok(ImagePayload::new(bytes, mime_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // Minimal PNG signature plus IHDR chunk header
    const PNG_BYTES: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52,
    ];

    #[tokio::test]
    async fn test_upload_resolve_fetch() {
        let dir = TempDir::new().unwrap();
        let store = LocalPhotoStore::new(dir.path().join("photos"), "http://localhost:5740/");

        let stored = store.upload(PNG_BYTES.to_vec()).await.unwrap();
        assert!(stored.photo_id.ends_with(".png"));
        assert_eq!(stored.mime_type, "image/png");
        assert_eq!(
            stored.url,
            format!("http://localhost:5740/photos/{}", stored.photo_id)
        );

        assert_eq!(store.resolve_url(&stored.photo_id).await, Some(stored.url.clone()));

        let payload = store.fetch(&stored.photo_id).await.unwrap();
        assert_eq!(payload.bytes, PNG_BYTES);
        assert_eq!(payload.mime_type, "image/png");
    }

    #[tokio::test]
    async fn test_rejects_non_images() {
        let dir = TempDir::new().unwrap();
        let store = LocalPhotoStore::new(dir.path().to_path_buf(), "http://x");

        let err = store.upload(b"just some text".to_vec()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(store.upload(Vec::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_unresolvable_references() {
        let dir = TempDir::new().unwrap();
        let store = LocalPhotoStore::new(dir.path().to_path_buf(), "http://x");

        assert_eq!(store.resolve_url("../psm.db").await, None);
        assert_eq!(store.resolve_url(&format!("{}.jpg", Uuid::new_v4())).await, None);
        assert!(matches!(
            store.fetch(&format!("{}.jpg", Uuid::new_v4())).await,
            Err(Error::NotFound(_))
        ));
    }
}

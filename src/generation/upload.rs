//! Conversion of user files into uploaded images, and their preview handles

use base64::{engine::general_purpose::STANDARD, Engine};
use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::generation::models::UploadedImage;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Failed to parse file data URL.")]
    MalformedDataUrl,

    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadedImage {
    /// Encode raw file bytes
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            data: STANDARD.encode(bytes),
            mime_type: mime_type.into(),
        }
    }

    /// Split a `data:<mime>;base64,<payload>` URL
    pub fn from_data_url(url: &str) -> Result<Self, UploadError> {
        let (meta, data) = url.split_once(',').ok_or(UploadError::MalformedDataUrl)?;
        let mime_type = meta
            .strip_prefix("data:")
            .and_then(|rest| rest.split(';').next())
            .filter(|mime| !mime.is_empty())
            .ok_or(UploadError::MalformedDataUrl)?;

        if data.is_empty() {
            return Err(UploadError::MalformedDataUrl);
        }

        Ok(Self {
            data: data.to_string(),
            mime_type: mime_type.to_string(),
        })
    }

    /// Read an image file, deriving the mime type from its extension
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, UploadError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        let mime_type = match extension.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "webp" => "image/webp",
            "gif" => "image/gif",
            "bmp" => "image/bmp",
            _ => return Err(UploadError::UnsupportedType(path.display().to_string())),
        };

        let bytes = std::fs::read(path)?;
        Ok(Self::from_bytes(&bytes, mime_type))
    }

    /// Reassemble the data URL form
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Tracks preview resources that are alive
#[derive(Debug, Clone, Default)]
pub struct PreviewStore {
    live: Arc<DashMap<Uuid, String>>,
}

impl PreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a preview for an image. Released when the handle drops.
    pub fn acquire(&self, image: &UploadedImage) -> PreviewHandle {
        let id = Uuid::new_v4();
        self.live.insert(id, image.mime_type.clone());
        PreviewHandle {
            id,
            live: self.live.clone(),
        }
    }

    /// Number of previews not yet released
    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

/// A temporary preview reference, released on drop
#[derive(Debug)]
pub struct PreviewHandle {
    id: Uuid,
    live: Arc<DashMap<Uuid, String>>,
}

impl PreviewHandle {
    pub fn url(&self) -> String {
        format!("preview://{}", self.id)
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        if self.live.remove(&self.id).is_some() {
            debug!(preview = %self.id, "Released preview");
        }
    }
}

/// Ordered source images of the pending request, each with its preview
#[derive(Debug)]
pub struct UploadTray {
    entries: Vec<(UploadedImage, PreviewHandle)>,
    previews: PreviewStore,
}

impl UploadTray {
    pub fn new(previews: PreviewStore) -> Self {
        Self {
            entries: Vec::new(),
            previews,
        }
    }

    /// Append an image and return its preview URL
    pub fn add(&mut self, image: UploadedImage) -> String {
        let handle = self.previews.acquire(&image);
        let url = handle.url();
        self.entries.push((image, handle));
        url
    }

    /// Remove the image at `index`, releasing its preview
    pub fn remove(&mut self, index: usize) -> Option<UploadedImage> {
        if index >= self.entries.len() {
            return None;
        }
        let (image, _handle) = self.entries.remove(index);
        Some(image)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Snapshot of the images in upload order
    pub fn images(&self) -> Vec<UploadedImage> {
        self.entries.iter().map(|(image, _)| image.clone()).collect()
    }

    pub fn preview_urls(&self) -> Vec<String> {
        self.entries.iter().map(|(_, handle)| handle.url()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Image storage for article attachments.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::MediaConfig;
use crate::error::{AppError, AppResult};

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

/// An uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Bytes,
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Persist `data` under `category` and return the public reference.
    async fn save(&self, category: &str, extension: &str, data: Bytes) -> AppResult<String>;

    /// Delete a file previously returned by `save`. Missing files are not an error.
    async fn remove(&self, reference: &str) -> AppResult<()>;
}

/// Writes files below a root directory and hands out URLs under a prefix.
pub struct LocalFileStorage {
    root: PathBuf,
    url_prefix: String,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>, url_prefix: &str) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &MediaConfig) -> Self {
        Self::new(config.root.clone(), &config.url)
    }

    /// Map a public reference back to a path under the root. Only plain
    /// `{prefix}/{category}/{file}` references resolve.
    fn path_for(&self, reference: &str) -> Option<PathBuf> {
        let rel = reference.strip_prefix(&self.url_prefix)?.strip_prefix('/')?;
        let (category, file) = rel.split_once('/')?;
        let plain = |s: &str| !s.is_empty() && s != "." && s != ".." && !s.contains(['/', '\\']);
        if !plain(category) || !plain(file) {
            return None;
        }
        Some(self.root.join(category).join(file))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn save(&self, category: &str, extension: &str, data: Bytes) -> AppResult<String> {
        let dir = self.root.join(category);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to create upload directory: {}", e)))?;

        let filename = format!("{}.{}", Uuid::new_v4(), extension);
        tokio::fs::write(dir.join(&filename), &data)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write upload file: {}", e)))?;

        tracing::info!("Image stored: {}/{} ({} bytes)", category, filename, data.len());
        Ok(format!("{}/{}/{}", self.url_prefix, category, filename))
    }

    async fn remove(&self, reference: &str) -> AppResult<()> {
        let path = self
            .path_for(reference)
            .ok_or_else(|| AppError::Storage(format!("Not a stored file: {}", reference)))?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!("Image removed: {}", reference);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!("Failed to remove upload file: {}", e))),
        }
    }
}

fn validate_image_magic_bytes(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < 4 {
        return None;
    }
    match bytes {
        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        // PNG: 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        // GIF: 47 49 46 38
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        // WebP: 52 49 46 46 ... 57 45 42 50
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        _ => None,
    }
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "bin",
    }
}

/// Checks name, size and content of an image upload. Returns the extension
/// the stored file should carry, derived from the content.
pub fn validate_image(upload: &Upload, max_bytes: usize) -> AppResult<&'static str> {
    let original_ext = upload
        .file_name
        .rsplit('.')
        .next()
        .unwrap_or("")
        .to_lowercase();
    if !ALLOWED_EXTENSIONS.contains(&original_ext.as_str()) {
        return Err(AppError::Validation(
            "Unsupported file type. Allowed: JPEG, PNG, WebP, GIF.".to_string(),
        ));
    }
    if upload.bytes.is_empty() {
        return Err(AppError::Validation("Empty file".to_string()));
    }
    if upload.bytes.len() > max_bytes {
        return Err(AppError::Validation(format!(
            "File too large. Maximum size is {} bytes.",
            max_bytes
        )));
    }
    let mime = validate_image_magic_bytes(&upload.bytes).ok_or_else(|| {
        AppError::Validation("File content does not match an allowed image type.".to_string())
    })?;
    Ok(extension_for_mime(mime))
}

#[cfg(test)]
pub(crate) const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
];

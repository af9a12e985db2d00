//! Local file storage for uploaded media.
//!
//! Uploaded images land in a flat upload directory under a unique name and
//! are served back at `/uploads/<name>` by the HTTP layer.

use std::path::{Path, PathBuf};

const ALLOWED_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp", ".bmp"];
const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/bmp",
];

/// Default cap on upload size: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("File type '{0}' is not allowed")]
    InvalidFileType(String),
    #[error("File size {size} exceeds maximum allowed size of {max} bytes")]
    FileTooLarge { size: usize, max: usize },
    #[error("Failed to store file: {0}")]
    Io(#[from] std::io::Error),
}

/// Validating writer for the upload directory.
#[derive(Clone)]
pub struct FileStorage {
    upload_dir: PathBuf,
    max_size: usize,
}

impl FileStorage {
    /// Create a storage rooted at `upload_dir`, creating it if needed.
    pub fn new(upload_dir: impl Into<PathBuf>, max_size: usize) -> Result<Self, UploadError> {
        let upload_dir = upload_dir.into();
        std::fs::create_dir_all(&upload_dir)?;
        Ok(Self {
            upload_dir,
            max_size,
        })
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    fn validate_extension(filename: &str) -> Result<String, UploadError> {
        let ext = Path::new(filename)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
            Ok(ext)
        } else {
            Err(UploadError::InvalidFileType(ext))
        }
    }

    fn validate_content_type(content_type: Option<&str>) -> Result<(), UploadError> {
        match content_type {
            Some(ct) if !ALLOWED_CONTENT_TYPES.contains(&ct) => {
                Err(UploadError::InvalidFileType(ct.to_string()))
            }
            _ => Ok(()),
        }
    }

    fn unique_filename(ext: &str) -> String {
        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let id = uuid::Uuid::new_v4().simple().to_string();
        format!("{}_{}{}", timestamp, &id[..8], ext)
    }

    /// Validate and store file content; returns the public URL path.
    pub async fn save(
        &self,
        content: &[u8],
        filename: &str,
        content_type: Option<&str>,
    ) -> Result<String, UploadError> {
        let ext = Self::validate_extension(filename)?;
        Self::validate_content_type(content_type)?;
        if content.len() > self.max_size {
            return Err(UploadError::FileTooLarge {
                size: content.len(),
                max: self.max_size,
            });
        }

        let unique_filename = Self::unique_filename(&ext);
        let path = self.upload_dir.join(&unique_filename);

        if let Err(e) = tokio::fs::write(&path, content).await {
            // Drop any partially written file.
            tokio::fs::remove_file(&path).await.ok();
            return Err(UploadError::Io(e));
        }

        tracing::info!(
            "Stored upload {} ({} bytes)",
            unique_filename,
            content.len()
        );
        Ok(format!("/uploads/{}", unique_filename))
    }

    /// Delete a previously stored file by its URL path. Returns whether a
    /// file was actually removed.
    pub async fn delete(&self, file_url: &str) -> bool {
        let Some(path) = self.path_for(file_url) else {
            return false;
        };
        tokio::fs::remove_file(&path).await.is_ok()
    }

    /// Resolve a `/uploads/...` URL to a path inside the upload directory.
    /// Rejects names that would escape it.
    pub fn path_for(&self, file_url: &str) -> Option<PathBuf> {
        let filename = file_url.strip_prefix("/uploads/").unwrap_or(file_url);
        if filename.is_empty() || filename.contains('/') || filename.contains("..") {
            return None;
        }
        Some(self.upload_dir.join(filename))
    }
}

//! Image storage
//!
//! Uploaded images go through [`UploadService`], which checks type, size and
//! content, then hands them to an [`ImageStore`]:
//! - [`LocalImageStore`] writes into a directory served under `/uploads`
//! - [`RemoteImageStore`] posts the file to an HTTP image host and keeps the
//!   URL it answers with

use crate::config::{StorageConfig, StorageDriver};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const REMOTE_TIMEOUT_SECS: u64 = 30;

/// A validated image ready to be stored
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// Generated file name, unique per upload
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Where an image ended up
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredImage {
    pub url: String,
    pub filename: String,
    pub size: u64,
    pub content_type: String,
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn store(&self, upload: ImageUpload) -> Result<StoredImage>;

    fn name(&self) -> &'static str;
}

/// Files written to a local directory
pub struct LocalImageStore {
    dir: PathBuf,
    public_base_url: String,
}

impl LocalImageStore {
    pub fn new(dir: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            public_base_url: public_base_url.into(),
        }
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn store(&self, upload: ImageUpload) -> Result<StoredImage> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create upload directory {}", self.dir.display()))?;

        let path = self.dir.join(&upload.filename);
        tokio::fs::write(&path, &upload.bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(StoredImage {
            url: format!("{}/{}", self.public_base_url.trim_end_matches('/'), upload.filename),
            size: upload.bytes.len() as u64,
            filename: upload.filename,
            content_type: upload.content_type,
        })
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

/// Reply of the remote image host
#[derive(Debug, Deserialize)]
struct RemoteReply {
    secure_url: Option<String>,
    url: Option<String>,
}

/// Files sent as multipart to an HTTP image host
pub struct RemoteImageStore {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    folder: Option<String>,
}

impl RemoteImageStore {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, folder: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REMOTE_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            folder,
        })
    }
}

#[async_trait]
impl ImageStore for RemoteImageStore {
    async fn store(&self, upload: ImageUpload) -> Result<StoredImage> {
        let size = upload.bytes.len() as u64;
        let part = reqwest::multipart::Part::bytes(upload.bytes)
            .file_name(upload.filename.clone())
            .mime_str(&upload.content_type)
            .context("Invalid content type")?;
        let mut form = reqwest::multipart::Form::new().part("file", part);
        if let Some(folder) = &self.folder {
            form = form.text("folder", folder.clone());
        }

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let reply: RemoteReply = request
            .send()
            .await
            .context("Image host request failed")?
            .error_for_status()
            .context("Image host rejected the upload")?
            .json()
            .await
            .context("Image host sent an unreadable reply")?;

        let url = reply
            .secure_url
            .or(reply.url)
            .context("Image host reply has no URL")?;

        Ok(StoredImage {
            url,
            filename: upload.filename,
            size,
            content_type: upload.content_type,
        })
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

/// Build the store selected by configuration
pub fn create_image_store(config: &StorageConfig) -> Result<Arc<dyn ImageStore>> {
    match config.driver {
        StorageDriver::Local => Ok(Arc::new(LocalImageStore::new(
            &config.local.path,
            config.local.public_base_url.clone(),
        ))),
        StorageDriver::Remote => Ok(Arc::new(RemoteImageStore::new(
            config.remote.endpoint.clone(),
            config.remote.api_key.clone(),
            config.remote.folder.clone(),
        )?)),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("No file provided")]
    Missing,

    #[error("File type not allowed: {0}")]
    UnsupportedType(String),

    #[error("File too large, maximum is {max} bytes")]
    TooLarge { max: u64 },

    #[error("File content does not match its declared type")]
    ContentMismatch,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Validates uploads against the storage limits before storing them
pub struct UploadService {
    store: Arc<dyn ImageStore>,
    config: StorageConfig,
}

impl UploadService {
    pub fn new(store: Arc<dyn ImageStore>, config: &StorageConfig) -> Self {
        Self {
            store,
            config: config.clone(),
        }
    }

    pub fn max_file_size(&self) -> u64 {
        self.config.max_file_size
    }

    pub fn check_type(&self, content_type: &str) -> Result<(), UploadError> {
        if self.config.is_type_allowed(content_type) {
            Ok(())
        } else {
            Err(UploadError::UnsupportedType(content_type.to_string()))
        }
    }

    pub async fn upload(
        &self,
        original_name: Option<&str>,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredImage, UploadError> {
        let content_type = content_type.to_ascii_lowercase();
        self.check_type(&content_type)?;
        if bytes.is_empty() {
            return Err(UploadError::Missing);
        }
        if bytes.len() as u64 > self.config.max_file_size {
            return Err(UploadError::TooLarge {
                max: self.config.max_file_size,
            });
        }
        let sniffed = sniff_image_type(&bytes);
        let declared_known = SNIFFED_TYPES.contains(&content_type.as_str());
        match sniffed {
            Some(actual) if actual != content_type => return Err(UploadError::ContentMismatch),
            None if declared_known => return Err(UploadError::ContentMismatch),
            _ => {}
        }

        let filename = format!(
            "{}.{}",
            Uuid::new_v4().simple(),
            file_extension(original_name, &content_type)
        );
        let stored = self
            .store
            .store(ImageUpload {
                filename,
                content_type,
                bytes,
            })
            .await?;

        tracing::info!(store = self.store.name(), url = %stored.url, size = stored.size, "Image stored");
        Ok(stored)
    }
}

/// Types `sniff_image_type` can recognize; uploads declaring one of these
/// must carry matching magic bytes
const SNIFFED_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// MIME type recognized from the leading bytes of common image formats
pub fn sniff_image_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

/// Extension from the content type, else from the original file name
fn file_extension(original_name: Option<&str>, content_type: &str) -> String {
    let known = match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/svg+xml" => Some("svg"),
        "image/avif" => Some("avif"),
        _ => None,
    };
    if let Some(ext) = known {
        return ext.to_string();
    }

    original_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string())
}

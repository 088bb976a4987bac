use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ServiceResult, ServiceSettings};
use crate::auth::{policy, Action, AuthUser};
use crate::config::StorageConfig;
use crate::error::ServiceError;

const SERVICE: &str = "image storage";
const IMAGEKIT_UPLOAD_URL: &str = "https://upload.imagekit.io/api/v1/files/upload";

pub const ALLOWED_CONTENT_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/webp", "image/gif"];

/// One file as received from the multipart body.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredImage {
    pub url: String,
    pub file_id: String,
    pub name: String,
}

#[async_trait]
pub trait ImageStorage: Send + Sync {
    async fn store(&self, upload: ImageUpload, folder: &str) -> Result<StoredImage, ServiceError>;
}

/// ImageKit upload API, authenticated with the private key.
pub struct ImageKitStorage {
    http: reqwest::Client,
    private_key: Option<String>,
}

impl ImageKitStorage {
    pub fn new(settings: &StorageConfig, http: reqwest::Client) -> Self {
        Self { http, private_key: settings.imagekit_private_key.clone() }
    }
}

#[async_trait]
impl ImageStorage for ImageKitStorage {
    async fn store(&self, upload: ImageUpload, folder: &str) -> Result<StoredImage, ServiceError> {
        let key = self
            .private_key
            .as_deref()
            .ok_or_else(|| ServiceError::dependency(SERVICE, "IMAGEKIT_PRIVATE_KEY is not configured"))?;

        let part = Part::bytes(upload.bytes)
            .file_name(upload.file_name.clone())
            .mime_str(&upload.content_type)
            .map_err(|e| ServiceError::dependency(SERVICE, e.to_string()))?;
        let form = Form::new()
            .part("file", part)
            .text("fileName", upload.file_name)
            .text("folder", folder.to_string())
            .text("useUniqueFileName", "true");

        let response = self
            .http
            .post(IMAGEKIT_UPLOAD_URL)
            .basic_auth(key, Some(""))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ServiceError::dependency(SERVICE, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::dependency(SERVICE, format!("{}: {}", status, body)));
        }

        response
            .json::<StoredImage>()
            .await
            .map_err(|e| ServiceError::dependency(SERVICE, e.to_string()))
    }
}

pub struct UploadService {
    storage: Arc<dyn ImageStorage>,
    settings: ServiceSettings,
}

impl UploadService {
    pub fn new(storage: Arc<dyn ImageStorage>, settings: ServiceSettings) -> Self {
        Self { storage, settings }
    }

    pub fn max_bytes(&self) -> usize {
        self.settings.max_upload_bytes
    }

    pub async fn upload_image(&self, user: &AuthUser, upload: ImageUpload) -> ServiceResult<StoredImage> {
        policy::require(user.role, Action::UploadJobPhoto)?;

        if upload.bytes.is_empty() {
            return Err(ServiceError::invalid("file", "No file uploaded"));
        }
        if upload.bytes.len() > self.settings.max_upload_bytes {
            return Err(ServiceError::invalid("file", "File is larger than the 10MB limit"));
        }
        let content_type = upload.content_type.to_ascii_lowercase();
        if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
            return Err(ServiceError::invalid("file", "Only JPEG, PNG, WebP and GIF images are allowed"));
        }

        let size = upload.bytes.len();
        let stored = self
            .storage
            .store(ImageUpload { content_type, ..upload }, &self.settings.upload_folder)
            .await?;
        tracing::info!(user_id = %user.id, file_id = %stored.file_id, size, "Image uploaded");
        Ok(stored)
    }
}

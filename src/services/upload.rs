// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Image uploads to object storage.
//!
//! Clients send images inline as base64; the uploader stores the bytes and
//! returns the public URL that ends up on the activity or user.

use crate::error::AppError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;

/// Largest accepted image, after decoding.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Inline image payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageUpload {
    /// MIME type, e.g. `image/png`
    pub content_type: String,
    /// Standard base64 of the file contents
    pub data_base64: String,
}

impl ImageUpload {
    /// File extension for the content type; `None` for unsupported types.
    pub fn extension(&self) -> Option<&'static str> {
        match self.content_type.as_str() {
            "image/png" => Some("png"),
            "image/jpeg" | "image/jpg" => Some("jpg"),
            "image/webp" => Some("webp"),
            "image/gif" => Some("gif"),
            _ => None,
        }
    }

    /// Decode and size-check the payload.
    pub fn decode(&self) -> Result<Vec<u8>, AppError> {
        if self.extension().is_none() {
            return Err(AppError::BadRequest(format!(
                "Unsupported image type: {}",
                self.content_type
            )));
        }
        let bytes = BASE64
            .decode(self.data_base64.trim())
            .map_err(|_| AppError::BadRequest("Image is not valid base64".to_string()))?;
        if bytes.is_empty() {
            return Err(AppError::BadRequest("Image is empty".to_string()));
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(AppError::BadRequest(format!(
                "Image exceeds {} bytes",
                MAX_IMAGE_BYTES
            )));
        }
        Ok(bytes)
    }

    fn object_name(&self) -> String {
        format!(
            "{}.{}",
            uuid::Uuid::new_v4(),
            self.extension().unwrap_or("bin")
        )
    }
}

/// Object storage collaborator.
#[async_trait]
pub trait ImageUploader: Send + Sync {
    /// Store the image and return its public URL.
    async fn upload_image(&self, image: &ImageUpload) -> Result<String, AppError>;
}

/// Uploads with `PUT {upload_url}/{object}` and serves from `public_base_url`.
pub struct HttpImageUploader {
    client: reqwest::Client,
    upload_url: String,
    public_base_url: String,
}

impl HttpImageUploader {
    pub fn new(upload_url: String, public_base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            upload_url,
            public_base_url,
        }
    }
}

#[async_trait]
impl ImageUploader for HttpImageUploader {
    async fn upload_image(&self, image: &ImageUpload) -> Result<String, AppError> {
        let bytes = image.decode()?;
        let object = image.object_name();
        let size = bytes.len();

        let response = self
            .client
            .put(format!("{}/{}", self.upload_url, object))
            .header(reqwest::header::CONTENT_TYPE, image.content_type.as_str())
            .body(bytes)
            .send()
            .await
            .map_err(|e| AppError::Upload(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::Upload(format!(
                "Object storage returned {}",
                response.status()
            )));
        }

        tracing::info!(object = %object, size, "Image uploaded");
        Ok(format!("{}/{}", self.public_base_url, object))
    }
}

/// Rejects every upload; used when no object storage is configured.
pub struct DisabledImageUploader;

#[async_trait]
impl ImageUploader for DisabledImageUploader {
    async fn upload_image(&self, image: &ImageUpload) -> Result<String, AppError> {
        image.decode()?;
        Err(AppError::Upload(
            "Image uploads are not configured".to_string(),
        ))
    }
}

/// Validates payloads and hands out placeholder URLs without storing anything.
#[derive(Default)]
pub struct MockImageUploader;

#[async_trait]
impl ImageUploader for MockImageUploader {
    async fn upload_image(&self, image: &ImageUpload) -> Result<String, AppError> {
        image.decode()?;
        Ok(format!("https://images.invalid/{}", image.object_name()))
    }
}

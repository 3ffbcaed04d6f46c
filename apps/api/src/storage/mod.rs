//! Image storage.
//!
//! Uploads go to Dropbox when its credentials are configured, otherwise to
//! Cloudinary. Both providers hand back a public direct-access URL that is
//! stored in the activity row; the backend never serves image bytes itself.

use axum::{
    extract::{Multipart, Path, State},
    Extension, Json,
};
use bytes::Bytes;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::info;

use crate::auth::{AuthUser, Permission};
use crate::config::Config;
use crate::errors::AppError;
use crate::oauth::TokenError;
use crate::state::AppState;

pub mod cloudinary;
pub mod dropbox;

use cloudinary::CloudinaryStorage;
use dropbox::DropboxStorage;

pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("token refresh failed: {0}")]
    Token(String),

    #[error("no image storage provider is configured")]
    NotConfigured,
}

impl From<TokenError> for StorageError {
    fn from(err: TokenError) -> Self {
        StorageError::Token(err.to_string())
    }
}

pub(crate) async fn check(response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(StorageError::Api {
        status: status.as_u16(),
        message,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub image_url: String,
    pub thumbnail_url: Option<String>,
    pub storage_type: &'static str,
}

/// Provider selection: Dropbox first, Cloudinary as fallback.
pub struct ImageStorage {
    dropbox: Option<DropboxStorage>,
    cloudinary: Option<CloudinaryStorage>,
}

impl ImageStorage {
    pub fn from_config(config: &Config, http: &Client) -> Self {
        let dropbox = match (
            &config.dropbox_app_key,
            &config.dropbox_app_secret,
            &config.dropbox_refresh_token,
        ) {
            (Some(key), Some(secret), Some(refresh)) => Some(DropboxStorage::new(
                http.clone(),
                key.clone(),
                secret.clone(),
                refresh.clone(),
            )),
            _ => None,
        };
        let cloudinary = match (
            &config.cloudinary_cloud_name,
            &config.cloudinary_api_key,
            &config.cloudinary_api_secret,
        ) {
            (Some(cloud), Some(key), Some(secret)) => Some(CloudinaryStorage::new(
                http.clone(),
                cloud.clone(),
                key.clone(),
                secret.clone(),
            )),
            _ => None,
        };
        Self { dropbox, cloudinary }
    }

    pub fn provider_name(&self) -> &'static str {
        if self.dropbox.is_some() {
            "dropbox"
        } else if self.cloudinary.is_some() {
            "cloudinary"
        } else {
            "none"
        }
    }

    pub async fn upload(
        &self,
        data: Bytes,
        original_name: &str,
    ) -> Result<UploadedImage, StorageError> {
        if let Some(dropbox) = &self.dropbox {
            return dropbox.upload(data, original_name).await;
        }
        if let Some(cloudinary) = &self.cloudinary {
            return cloudinary.upload(data, original_name).await;
        }
        Err(StorageError::NotConfigured)
    }
}

/// POST /api/upload-image
///
/// Multipart upload, `image/*` only, capped at 10MB (also enforced by the
/// route's body limit).
pub async fn handle_upload_image(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    user.require(Permission::Edit)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("image/") {
            return Err(AppError::Validation(
                "only image uploads are accepted".to_string(),
            ));
        }
        let filename = field.file_name().unwrap_or("upload.jpg").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("failed to read upload: {e}")))?;
        if data.is_empty() {
            return Err(AppError::Validation("uploaded image is empty".to_string()));
        }
        if data.len() > MAX_IMAGE_BYTES {
            return Err(AppError::Validation(
                "image exceeds the 10MB limit".to_string(),
            ));
        }

        info!(
            "uploading image '{filename}' ({} bytes) via {}",
            data.len(),
            state.storage.provider_name()
        );
        let uploaded = state.storage.upload(data, &filename).await?;
        return Ok(Json(json!({
            "success": true,
            "imageUrl": uploaded.image_url,
            "thumbnailUrl": uploaded.thumbnail_url,
            "storageType": uploaded.storage_type,
        })));
    }

    Err(AppError::Validation(
        "multipart field 'image' is required".to_string(),
    ))
}

/// DELETE /api/delete-image/:id
///
/// Known limitation: nothing is deleted remotely, but the call reports
/// success so the frontend can drop its local copy of the URL.
pub async fn handle_delete_image(
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    user.require(Permission::Edit)?;
    info!("image delete requested for '{id}' (no-op)");
    Ok(Json(json!({
        "success": true,
        "message": format!("image {id} removed"),
    })))
}

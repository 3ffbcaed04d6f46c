//! Cloudinary upload client.
//!
//! Images go up as base64 data URIs on the signed upload endpoint; the
//! thumbnail URL is derived from the returned public id rather than eagerly
//! transformed at upload time.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

use crate::storage::{check, StorageError, UploadedImage};

const FOLDER: &str = "itinerary-images";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

pub struct CloudinaryStorage {
    http: Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

impl CloudinaryStorage {
    pub fn new(http: Client, cloud_name: String, api_key: String, api_secret: String) -> Self {
        Self {
            http,
            cloud_name,
            api_key,
            api_secret,
        }
    }

    pub async fn upload(
        &self,
        data: Bytes,
        original_name: &str,
    ) -> Result<UploadedImage, StorageError> {
        let public_id = Uuid::new_v4().simple().to_string();
        let timestamp = chrono::Utc::now().timestamp();

        // Signature over the alphabetically ordered params, SHA-256 variant.
        let to_sign =
            format!("folder={FOLDER}&public_id={public_id}&timestamp={timestamp}");
        let signature = sign(&to_sign, &self.api_secret);

        let data_uri = format!(
            "data:{};base64,{}",
            mime_type(original_name),
            BASE64.encode(&data)
        );

        let form = reqwest::multipart::Form::new()
            .text("file", data_uri)
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp.to_string())
            .text("public_id", public_id)
            .text("folder", FOLDER)
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let url = format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.cloud_name
        );
        let response = self.http.post(&url).multipart(form).send().await?;
        let body: UploadResponse = check(response).await?.json().await?;
        debug!("uploaded image to cloudinary as '{}'", body.public_id);

        let thumbnail_url = format!(
            "https://res.cloudinary.com/{}/image/upload/w_300,h_200,c_fill,q_auto:good/{}",
            self.cloud_name, body.public_id
        );
        Ok(UploadedImage {
            image_url: body.secure_url,
            thumbnail_url: Some(thumbnail_url),
            storage_type: "cloudinary",
        })
    }
}

fn sign(params: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(params.as_bytes());
    hasher.update(secret.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn mime_type(filename: &str) -> &'static str {
    let extension = filename
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    match extension.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_is_deterministic_hex() {
        let a = sign("folder=x&public_id=y&timestamp=1", "secret");
        let b = sign("folder=x&public_id=y&timestamp=1", "secret");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_sign_varies_with_secret() {
        assert_ne!(sign("timestamp=1", "one"), sign("timestamp=1", "two"));
    }

    #[test]
    fn test_mime_type_from_extension() {
        assert_eq!(mime_type("photo.PNG"), "image/png");
        assert_eq!(mime_type("anim.gif"), "image/gif");
        assert_eq!(mime_type("pic.jpeg"), "image/jpeg");
        assert_eq!(mime_type("noextension"), "image/jpeg");
    }
}

//! Dropbox upload client.
//!
//! Files land under a fixed app folder; the public URL comes from a shared
//! link rewritten to the direct-content host. Access tokens are short-lived
//! and refreshed through the shared OAuth refresh-grant manager.

use bytes::Bytes;
use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::oauth::OauthTokenManager;
use crate::storage::{check, StorageError, UploadedImage};

const UPLOAD_URL: &str = "https://content.dropboxapi.com/2/files/upload";
const SHARE_URL: &str = "https://api.dropboxapi.com/2/sharing/create_shared_link_with_settings";
const LIST_LINKS_URL: &str = "https://api.dropboxapi.com/2/sharing/list_shared_links";
const TOKEN_URL: &str = "https://api.dropboxapi.com/oauth2/token";
const FOLDER: &str = "/itinerary-images";

#[derive(Debug, Deserialize)]
struct SharedLink {
    url: String,
}

#[derive(Debug, Deserialize)]
struct SharedLinkList {
    links: Vec<SharedLink>,
}

pub struct DropboxStorage {
    http: Client,
    token: OauthTokenManager,
}

impl DropboxStorage {
    pub fn new(http: Client, app_key: String, app_secret: String, refresh_token: String) -> Self {
        Self {
            token: OauthTokenManager::new(
                http.clone(),
                TOKEN_URL,
                app_key,
                app_secret,
                refresh_token,
            ),
            http,
        }
    }

    pub async fn upload(
        &self,
        data: Bytes,
        original_name: &str,
    ) -> Result<UploadedImage, StorageError> {
        let token = self.token.access_token().await?;
        let path = format!(
            "{FOLDER}/{}_{}",
            Uuid::new_v4().simple(),
            sanitize_filename(original_name)
        );

        let arg = json!({
            "path": path,
            "mode": "add",
            "autorename": true,
            "mute": true
        });
        let response = self
            .http
            .post(UPLOAD_URL)
            .bearer_auth(&token)
            .header("Dropbox-API-Arg", arg.to_string())
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await?;
        check(response).await?;
        debug!("uploaded image to dropbox path '{path}'");

        let shared = self.shared_link(&token, &path).await?;
        Ok(UploadedImage {
            image_url: direct_url(&shared),
            thumbnail_url: None,
            storage_type: "dropbox",
        })
    }

    async fn shared_link(&self, token: &str, path: &str) -> Result<String, StorageError> {
        let response = self
            .http
            .post(SHARE_URL)
            .bearer_auth(token)
            .json(&json!({ "path": path }))
            .send()
            .await?;

        // 409 means a link already exists for this path; look it up instead.
        if response.status().as_u16() == 409 {
            let response = self
                .http
                .post(LIST_LINKS_URL)
                .bearer_auth(token)
                .json(&json!({ "path": path, "direct_only": true }))
                .send()
                .await?;
            let list: SharedLinkList = check(response).await?.json().await?;
            return list
                .links
                .into_iter()
                .next()
                .map(|l| l.url)
                .ok_or(StorageError::Api {
                    status: 409,
                    message: format!("no shared link available for {path}"),
                });
        }

        let link: SharedLink = check(response).await?.json().await?;
        Ok(link.url)
    }
}

/// Rewrites a shared link to the direct-content host so the browser can use
/// it in an `<img>` tag.
fn direct_url(shared: &str) -> String {
    shared
        .replace("www.dropbox.com", "dl.dropboxusercontent.com")
        .replace("?dl=0", "")
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_url_rewrites_host_and_query() {
        assert_eq!(
            direct_url("https://www.dropbox.com/s/abc/photo.jpg?dl=0"),
            "https://dl.dropboxusercontent.com/s/abc/photo.jpg"
        );
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("my photo (1).jpg"), "my-photo--1-.jpg");
        assert_eq!(sanitize_filename("safe_name.png"), "safe_name.png");
    }
}

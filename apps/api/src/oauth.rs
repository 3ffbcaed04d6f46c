//! OAuth2 refresh-token grant plumbing shared by the Sheets and Dropbox
//! clients. Only the refresh grant is implemented; minting the initial
//! refresh token is an operator task outside this service.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

/// Tokens are treated as expired this long before their reported expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("token endpoint returned status {status}: {message}")]
    Endpoint { status: u16, message: String },

    #[error("token endpoint returned no access token")]
    MissingToken,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    refresh_token: Option<String>,
}

struct TokenState {
    access_token: Option<String>,
    refresh_token: String,
    expires_at: Option<Instant>,
}

impl TokenState {
    /// A token with no recorded expiry is assumed stale and refreshed.
    fn valid_token(&self) -> Option<String> {
        let expires_at = self.expires_at?;
        if Instant::now() + EXPIRY_MARGIN >= expires_at {
            return None;
        }
        self.access_token.clone()
    }
}

/// Keeps one OAuth2 access token fresh via the refresh-token grant.
///
/// The token state sits behind an async mutex held across the refresh call,
/// so at most one refresh is in flight; concurrent callers queue on the lock
/// and observe the refreshed token instead of triggering duplicates.
pub struct OauthTokenManager {
    http: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    state: tokio::sync::Mutex<TokenState>,
}

impl OauthTokenManager {
    pub fn new(
        http: Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            state: tokio::sync::Mutex::new(TokenState {
                access_token: None,
                refresh_token: refresh_token.into(),
                expires_at: None,
            }),
        }
    }

    /// Returns a valid access token, refreshing it first if needed.
    pub async fn access_token(&self) -> Result<String, TokenError> {
        let mut state = self.state.lock().await;
        if let Some(token) = state.valid_token() {
            return Ok(token);
        }

        info!("access token missing or expiring, refreshing via {}", self.token_url);
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", state.refresh_token.as_str()),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("token refresh failed with {status}: {message}");
            return Err(TokenError::Endpoint {
                status: status.as_u16(),
                message,
            });
        }

        let body: TokenResponse = response.json().await?;
        let access_token = body.access_token.ok_or(TokenError::MissingToken)?;

        // Some providers rotate the refresh token on use.
        if let Some(rotated) = body.refresh_token {
            state.refresh_token = rotated;
        }
        let expires_in = body.expires_in.unwrap_or(3600);
        state.expires_at = Some(Instant::now() + Duration::from_secs(expires_in));
        state.access_token = Some(access_token.clone());
        info!("access token refreshed, expires in {expires_in}s");

        Ok(access_token)
    }
}

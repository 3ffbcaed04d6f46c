use anyhow::{Context, Result};

use crate::itinerary::engine::IndexMode;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub sheet_id: String,
    /// Display name of the sheet holding per-day date/title metadata.
    pub headers_sheet: String,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_refresh_token: String,

    pub admin_user: String,
    pub admin_pass: String,
    pub viewer_user: Option<String>,
    pub viewer_pass: Option<String>,

    pub dropbox_app_key: Option<String>,
    pub dropbox_app_secret: Option<String>,
    pub dropbox_refresh_token: Option<String>,

    pub cloudinary_cloud_name: Option<String>,
    pub cloudinary_api_key: Option<String>,
    pub cloudinary_api_secret: Option<String>,

    pub aviationstack_api_key: Option<String>,

    pub database_path: String,
    pub frontend_dir: String,
    pub port: u16,
    pub rust_log: String,

    pub cache_headers_ttl_secs: u64,
    pub cache_day_ttl_secs: u64,
    pub insert_index_mode: IndexMode,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            sheet_id: require_env("SHEET_ID")?,
            headers_sheet: optional_env("HEADERS_SHEET").unwrap_or_else(|| "Headers".to_string()),
            google_client_id: require_env("GOOGLE_CLIENT_ID")?,
            google_client_secret: require_env("GOOGLE_CLIENT_SECRET")?,
            google_refresh_token: require_env("GOOGLE_REFRESH_TOKEN")?,

            admin_user: require_env("BASIC_AUTH_USER")?,
            admin_pass: require_env("BASIC_AUTH_PASS")?,
            viewer_user: optional_env("VIEWER_AUTH_USER"),
            viewer_pass: optional_env("VIEWER_AUTH_PASS"),

            dropbox_app_key: optional_env("DROPBOX_APP_KEY"),
            dropbox_app_secret: optional_env("DROPBOX_APP_SECRET"),
            dropbox_refresh_token: optional_env("DROPBOX_REFRESH_TOKEN"),

            cloudinary_cloud_name: optional_env("CLOUDINARY_CLOUD_NAME"),
            cloudinary_api_key: optional_env("CLOUDINARY_API_KEY"),
            cloudinary_api_secret: optional_env("CLOUDINARY_API_SECRET"),

            aviationstack_api_key: optional_env("AVIATIONSTACK_API_KEY"),

            database_path: optional_env("DATABASE_PATH")
                .unwrap_or_else(|| "reservations.db".to_string()),
            frontend_dir: optional_env("FRONTEND_DIR").unwrap_or_else(|| "frontend".to_string()),
            port: optional_env("PORT")
                .unwrap_or_else(|| "3002".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: optional_env("RUST_LOG").unwrap_or_else(|| "info".to_string()),

            cache_headers_ttl_secs: parse_env_u64("CACHE_HEADERS_TTL_SECS", 600)?,
            cache_day_ttl_secs: parse_env_u64("CACHE_DAY_TTL_SECS", 45)?,
            insert_index_mode: match optional_env("INSERT_INDEX_MODE").as_deref() {
                Some("adjusted") => IndexMode::DividerAdjusted,
                _ => IndexMode::Physical,
            },
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn parse_env_u64(key: &str, default: u64) -> Result<u64> {
    match optional_env(key) {
        Some(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("{key} must be a non-negative integer")),
        None => Ok(default),
    }
}

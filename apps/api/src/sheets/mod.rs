//! Remote row store client — the single point of entry for all Google
//! Sheets API calls.
//!
//! The spreadsheet is a repurposed database: no transactions, 1-based A1
//! addressing on the wire, and undocumented rate limits. Everything here
//! goes through the retry wrapper in [`retry`], and no other module may
//! talk to the Sheets API directly.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::oauth::{OauthTokenManager, TokenError};

pub mod retry;

use retry::{call_with_retry, RetryPolicy};

const SHEETS_API_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Columns A..H: date (dividers only), time, activity, notes, cost, link,
/// visible, image URL.
pub const COLUMN_SPAN: usize = 8;
const LAST_COLUMN: char = 'H';

/// A1 range covering one full row, 0-based `row` converted to 1-based.
pub fn row_range(sheet: &str, row: usize) -> String {
    format!("'{sheet}'!A{0}:{LAST_COLUMN}{0}", row + 1)
}

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sheets API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("sheet '{0}' not found in spreadsheet")]
    SheetNotFound(String),

    #[error("rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("token refresh failed: {0}")]
    Token(String),
}

impl SheetsError {
    /// Quota classification per the Sheets API: HTTP 429, or an error body
    /// carrying the quota-exceeded message.
    pub fn is_quota(&self) -> bool {
        match self {
            SheetsError::Api { status, message } => {
                *status == 429
                    || message.contains("Quota exceeded")
                    || message.contains("RATE_LIMIT_EXCEEDED")
            }
            _ => false,
        }
    }
}

impl From<TokenError> for SheetsError {
    fn from(err: TokenError) -> Self {
        SheetsError::Token(err.to_string())
    }
}

/// The row-store operations the positioning engine consumes.
///
/// Row indices are 0-based physical positions; conversion to the wire's
/// 1-based A1 notation happens inside the client. `insert_row_at` and
/// `delete_row_at` shift subsequent rows; `write_range` overwrites in place.
#[async_trait]
pub trait RowStore: Send + Sync {
    async fn read_rows(&self, sheet: &str) -> Result<Vec<Vec<String>>, SheetsError>;

    /// Resolves a sheet's display name to its internal numeric id, required
    /// by the structural (insert/delete) requests.
    async fn sheet_gid(&self, sheet: &str) -> Result<i64, SheetsError>;

    async fn insert_row_at(&self, sheet: &str, gid: i64, row: usize) -> Result<(), SheetsError>;

    async fn write_range(&self, sheet: &str, row: usize, values: &[String])
        -> Result<(), SheetsError>;

    async fn delete_row_at(&self, sheet: &str, gid: i64, row: usize) -> Result<(), SheetsError>;

    /// Appends past all existing rows. Fallback only: it ignores sort order.
    async fn append_row(&self, sheet: &str, values: &[String]) -> Result<(), SheetsError>;
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    values: Option<Vec<Vec<serde_json::Value>>>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

/// Google Sheets v4 REST client. One instance per process, shared via
/// `AppState`; authenticates with an OAuth2 access token kept fresh by the
/// refresh-token grant.
pub struct GoogleSheetsClient {
    http: Client,
    token: OauthTokenManager,
    spreadsheet_id: String,
    retry: RetryPolicy,
}

impl GoogleSheetsClient {
    pub fn new(
        http: Client,
        spreadsheet_id: String,
        client_id: String,
        client_secret: String,
        refresh_token: String,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            token: OauthTokenManager::new(
                http.clone(),
                GOOGLE_TOKEN_URL,
                client_id,
                client_secret,
                refresh_token,
            ),
            http,
            spreadsheet_id,
            retry,
        }
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{SHEETS_API_URL}/{}/values/{range}",
            self.spreadsheet_id
        )
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, SheetsError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(SheetsError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn read_rows_once(&self, sheet: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        let token = self.token.access_token().await?;
        let url = self.values_url(&format!("'{sheet}'"));
        let response = self.http.get(&url).bearer_auth(&token).send().await?;
        let body: ValueRange = Self::check(response).await?.json().await?;
        let rows = body
            .values
            .unwrap_or_default()
            .into_iter()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect::<Vec<Vec<String>>>();
        debug!("read {} rows from sheet '{sheet}'", rows.len());
        Ok(rows)
    }

    async fn sheet_gid_once(&self, sheet: &str) -> Result<i64, SheetsError> {
        let token = self.token.access_token().await?;
        let url = format!(
            "{SHEETS_API_URL}/{}?fields=sheets.properties",
            self.spreadsheet_id
        );
        let response = self.http.get(&url).bearer_auth(&token).send().await?;
        let meta: SpreadsheetMeta = Self::check(response).await?.json().await?;
        meta.sheets
            .into_iter()
            .find(|s| s.properties.title == sheet)
            .map(|s| s.properties.sheet_id)
            .ok_or_else(|| SheetsError::SheetNotFound(sheet.to_string()))
    }

    async fn batch_update(&self, request: serde_json::Value) -> Result<(), SheetsError> {
        let token = self.token.access_token().await?;
        let url = format!(
            "{SHEETS_API_URL}/{}:batchUpdate",
            self.spreadsheet_id
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&json!({ "requests": [request] }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn write_range_once(
        &self,
        sheet: &str,
        row: usize,
        values: &[String],
    ) -> Result<(), SheetsError> {
        let token = self.token.access_token().await?;
        let range = row_range(sheet, row);
        let url = format!("{}?valueInputOption=USER_ENTERED", self.values_url(&range));
        let response = self
            .http
            .put(&url)
            .bearer_auth(&token)
            .json(&json!({ "values": [values] }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn append_row_once(&self, sheet: &str, values: &[String]) -> Result<(), SheetsError> {
        let token = self.token.access_token().await?;
        let url = format!(
            "{}:append?valueInputOption=USER_ENTERED",
            self.values_url(&format!("'{sheet}'"))
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&json!({ "values": [values] }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl RowStore for GoogleSheetsClient {
    async fn read_rows(&self, sheet: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        call_with_retry(&self.retry, || self.read_rows_once(sheet)).await
    }

    async fn sheet_gid(&self, sheet: &str) -> Result<i64, SheetsError> {
        call_with_retry(&self.retry, || self.sheet_gid_once(sheet)).await
    }

    async fn insert_row_at(&self, sheet: &str, gid: i64, row: usize) -> Result<(), SheetsError> {
        debug!("inserting row at {row} in sheet '{sheet}' (gid {gid})");
        call_with_retry(&self.retry, || {
            self.batch_update(json!({
                "insertDimension": {
                    "range": {
                        "sheetId": gid,
                        "dimension": "ROWS",
                        "startIndex": row,
                        "endIndex": row + 1
                    },
                    "inheritFromBefore": false
                }
            }))
        })
        .await
    }

    async fn write_range(
        &self,
        sheet: &str,
        row: usize,
        values: &[String],
    ) -> Result<(), SheetsError> {
        call_with_retry(&self.retry, || self.write_range_once(sheet, row, values)).await
    }

    async fn delete_row_at(&self, sheet: &str, gid: i64, row: usize) -> Result<(), SheetsError> {
        debug!("deleting row {row} from sheet '{sheet}' (gid {gid})");
        call_with_retry(&self.retry, || {
            self.batch_update(json!({
                "deleteDimension": {
                    "range": {
                        "sheetId": gid,
                        "dimension": "ROWS",
                        "startIndex": row,
                        "endIndex": row + 1
                    }
                }
            }))
        })
        .await
    }

    async fn append_row(&self, sheet: &str, values: &[String]) -> Result<(), SheetsError> {
        call_with_retry(&self.retry, || self.append_row_once(sheet, values)).await
    }
}

fn cell_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

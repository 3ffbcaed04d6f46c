//! Flight-status lookup, proxied to the AviationStack API.

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::auth::{AuthUser, Permission};
use crate::errors::AppError;
use crate::state::AppState;

const API_URL: &str = "http://api.aviationstack.com/v1/flights";

pub struct FlightClient {
    http: Client,
    api_key: Option<String>,
}

impl FlightClient {
    pub fn new(http: Client, api_key: Option<String>) -> Self {
        Self { http, api_key }
    }

    /// Passes the upstream response body through untouched; the frontend
    /// digests AviationStack's schema itself.
    pub async fn status(&self, flight_number: &str, date: &str) -> Result<Value, AppError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Upstream("flight lookup is not configured".to_string()))?;

        debug!("looking up flight {flight_number} on {date}");
        let response = self
            .http
            .get(API_URL)
            .query(&[
                ("access_key", key),
                ("flight_iata", flight_number),
                ("flight_date", date),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("flight API request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "flight API returned {status}: {message}"
            )));
        }
        response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("flight API returned invalid JSON: {e}")))
    }
}

#[derive(Deserialize)]
pub struct FlightQuery {
    #[serde(rename = "flightNumber")]
    pub flight_number: String,
    pub date: String,
}

/// GET /api/flight-status?flightNumber=&date=
pub async fn handle_flight_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<FlightQuery>,
) -> Result<Json<Value>, AppError> {
    user.require(Permission::View)?;
    if query.flight_number.trim().is_empty() {
        return Err(AppError::Validation("flightNumber is required".to_string()));
    }
    chrono::NaiveDate::parse_from_str(&query.date, "%Y-%m-%d")
        .map_err(|_| AppError::Validation("date must be formatted YYYY-MM-DD".to_string()))?;

    let body = state.flights.status(&query.flight_number, &query.date).await?;
    Ok(Json(body))
}

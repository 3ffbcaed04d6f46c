//! Venue reservations, kept in SQLite rather than the sheet: they carry
//! more structure (guest counts, venue addresses) than an activity row and
//! have a real surrogate id.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::SqlitePool;

use crate::auth::{AuthUser, Permission};
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: i64,
    pub date: String,
    pub time: String,
    pub activity: String,
    pub guests: Option<i64>,
    pub venue_name: Option<String>,
    pub venue_address: Option<String>,
    pub reservation_name: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationInput {
    pub date: String,
    pub time: String,
    pub activity: String,
    #[serde(default)]
    pub guests: Option<i64>,
    #[serde(default)]
    pub venue_name: Option<String>,
    #[serde(default)]
    pub venue_address: Option<String>,
    #[serde(default)]
    pub reservation_name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ReservationInput {
    fn validate(&self) -> Result<(), AppError> {
        for (value, field) in [
            (&self.date, "date"),
            (&self.time, "time"),
            (&self.activity, "activity"),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Validation(format!("{field} is required")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationStats {
    pub total_reservations: i64,
    pub earliest_date: Option<String>,
    pub latest_date: Option<String>,
}

// ── Queries ─────────────────────────────────────────────────────────────

pub async fn reservations_by_date(
    pool: &SqlitePool,
    date: &str,
) -> Result<Vec<Reservation>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM reservations WHERE date = ? ORDER BY time ASC")
        .bind(date)
        .fetch_all(pool)
        .await
}

pub async fn all_reservations(pool: &SqlitePool) -> Result<Vec<Reservation>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM reservations ORDER BY date ASC, time ASC")
        .fetch_all(pool)
        .await
}

pub async fn search_by_venue(
    pool: &SqlitePool,
    venue: &str,
) -> Result<Vec<Reservation>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM reservations WHERE venue_name LIKE ? ORDER BY date ASC, time ASC",
    )
    .bind(format!("%{venue}%"))
    .fetch_all(pool)
    .await
}

pub async fn create_reservation(
    pool: &SqlitePool,
    input: &ReservationInput,
) -> Result<Reservation, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO reservations (
            date, time, activity, guests, venue_name,
            venue_address, reservation_name, notes
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.date)
    .bind(&input.time)
    .bind(&input.activity)
    .bind(input.guests)
    .bind(&input.venue_name)
    .bind(&input.venue_address)
    .bind(&input.reservation_name)
    .bind(&input.notes)
    .execute(pool)
    .await?;

    sqlx::query_as("SELECT * FROM reservations WHERE id = ?")
        .bind(result.last_insert_rowid())
        .fetch_one(pool)
        .await
}

/// Returns false when no row carries the id.
pub async fn update_reservation(
    pool: &SqlitePool,
    id: i64,
    input: &ReservationInput,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE reservations SET
            date = ?, time = ?, activity = ?, guests = ?,
            venue_name = ?, venue_address = ?, reservation_name = ?,
            notes = ?, updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(&input.date)
    .bind(&input.time)
    .bind(&input.activity)
    .bind(input.guests)
    .bind(&input.venue_name)
    .bind(&input.venue_address)
    .bind(&input.reservation_name)
    .bind(&input.notes)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_reservation(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM reservations WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn reservation_stats(pool: &SqlitePool) -> Result<ReservationStats, sqlx::Error> {
    let (total, earliest, latest): (i64, Option<String>, Option<String>) =
        sqlx::query_as("SELECT COUNT(*), MIN(date), MAX(date) FROM reservations")
            .fetch_one(pool)
            .await?;
    Ok(ReservationStats {
        total_reservations: total,
        earliest_date: earliest,
        latest_date: latest,
    })
}

// ── Handlers ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct DateQuery {
    pub date: String,
}

/// GET /api/reservations?date=
pub async fn handle_list_by_date(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Vec<Reservation>>, AppError> {
    user.require(Permission::View)?;
    if query.date.trim().is_empty() {
        return Err(AppError::Validation("date is required".to_string()));
    }
    Ok(Json(reservations_by_date(&state.db, &query.date).await?))
}

/// GET /api/reservations/all
pub async fn handle_list_all(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Reservation>>, AppError> {
    user.require(Permission::View)?;
    Ok(Json(all_reservations(&state.db).await?))
}

#[derive(Deserialize)]
pub struct VenueQuery {
    pub venue: String,
}

/// GET /api/reservations/search?venue=
pub async fn handle_search(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<VenueQuery>,
) -> Result<Json<Vec<Reservation>>, AppError> {
    user.require(Permission::View)?;
    if query.venue.trim().is_empty() {
        return Err(AppError::Validation("venue is required".to_string()));
    }
    Ok(Json(search_by_venue(&state.db, &query.venue).await?))
}

/// GET /api/reservations/stats
pub async fn handle_stats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ReservationStats>, AppError> {
    user.require(Permission::View)?;
    Ok(Json(reservation_stats(&state.db).await?))
}

/// POST /api/reservations
pub async fn handle_create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<ReservationInput>,
) -> Result<Json<Reservation>, AppError> {
    user.require(Permission::Add)?;
    input.validate()?;
    Ok(Json(create_reservation(&state.db, &input).await?))
}

/// PUT /api/reservations/:id
pub async fn handle_update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(input): Json<ReservationInput>,
) -> Result<Json<Value>, AppError> {
    user.require(Permission::Edit)?;
    input.validate()?;
    if !update_reservation(&state.db, id, &input).await? {
        return Err(AppError::NotFound(format!("reservation {id} not found")));
    }
    Ok(Json(json!({ "success": true, "id": id })))
}

/// DELETE /api/reservations/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    user.require(Permission::Delete)?;
    if !delete_reservation(&state.db, id).await? {
        return Err(AppError::NotFound(format!("reservation {id} not found")));
    }
    Ok(Json(json!({ "success": true, "id": id })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_pool;
    use tempfile::TempDir;

    async fn test_pool() -> (SqlitePool, TempDir) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");
        let pool = create_pool(path.to_str().unwrap()).await.unwrap();
        (pool, dir)
    }

    fn input(date: &str, time: &str, activity: &str, venue: Option<&str>) -> ReservationInput {
        ReservationInput {
            date: date.to_string(),
            time: time.to_string(),
            activity: activity.to_string(),
            guests: Some(2),
            venue_name: venue.map(|v| v.to_string()),
            venue_address: None,
            reservation_name: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_list_by_date_sorted_by_time() {
        let (pool, _dir) = test_pool().await;
        create_reservation(&pool, &input("2026-06-05", "19:00", "Dinner", None))
            .await
            .unwrap();
        create_reservation(&pool, &input("2026-06-05", "12:30", "Lunch", None))
            .await
            .unwrap();
        create_reservation(&pool, &input("2026-06-06", "09:00", "Brunch", None))
            .await
            .unwrap();

        let rows = reservations_by_date(&pool, "2026-06-05").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].activity, "Lunch");
        assert_eq!(rows[1].activity, "Dinner");
    }

    #[tokio::test]
    async fn test_search_by_venue_is_substring_match() {
        let (pool, _dir) = test_pool().await;
        create_reservation(&pool, &input("2026-06-05", "19:00", "Dinner", Some("Pierchic")))
            .await
            .unwrap();
        create_reservation(&pool, &input("2026-06-06", "20:00", "Dinner", Some("Al Mahara")))
            .await
            .unwrap();

        let rows = search_by_venue(&pool, "chic").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].venue_name.as_deref(), Some("Pierchic"));
    }

    #[tokio::test]
    async fn test_update_missing_row_reports_false() {
        let (pool, _dir) = test_pool().await;
        let updated = update_reservation(&pool, 999, &input("2026-06-05", "19:00", "Dinner", None))
            .await
            .unwrap();
        assert!(!updated);
    }

    #[tokio::test]
    async fn test_delete_removes_row() {
        let (pool, _dir) = test_pool().await;
        let created = create_reservation(&pool, &input("2026-06-05", "19:00", "Dinner", None))
            .await
            .unwrap();

        assert!(delete_reservation(&pool, created.id).await.unwrap());
        assert!(!delete_reservation(&pool, created.id).await.unwrap());
        assert!(all_reservations(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stats_cover_date_range() {
        let (pool, _dir) = test_pool().await;
        let empty = reservation_stats(&pool).await.unwrap();
        assert_eq!(empty.total_reservations, 0);
        assert_eq!(empty.earliest_date, None);

        create_reservation(&pool, &input("2026-06-05", "19:00", "Dinner", None))
            .await
            .unwrap();
        create_reservation(&pool, &input("2026-06-09", "12:00", "Lunch", None))
            .await
            .unwrap();

        let stats = reservation_stats(&pool).await.unwrap();
        assert_eq!(stats.total_reservations, 2);
        assert_eq!(stats.earliest_date.as_deref(), Some("2026-06-05"));
        assert_eq!(stats.latest_date.as_deref(), Some("2026-06-09"));
    }

    #[tokio::test]
    async fn test_input_validation_rejects_blank_fields() {
        let bad = input("", "19:00", "Dinner", None);
        assert!(matches!(bad.validate(), Err(AppError::Validation(_))));
    }
}

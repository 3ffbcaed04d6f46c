use std::str::FromStr;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

/// Opens (creating if needed) the SQLite reservations database and ensures
/// the schema exists.
pub async fn create_pool(database_path: &str) -> Result<SqlitePool> {
    info!("Opening SQLite database at {database_path}");

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{database_path}"))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    init_schema(&pool).await?;
    info!("SQLite connection pool established");
    Ok(pool)
}

async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reservations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            time TEXT NOT NULL,
            activity TEXT NOT NULL,
            guests INTEGER,
            venue_name TEXT,
            venue_address TEXT,
            reservation_name TEXT,
            notes TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    for index_sql in [
        "CREATE INDEX IF NOT EXISTS idx_reservations_date ON reservations(date)",
        "CREATE INDEX IF NOT EXISTS idx_reservations_time ON reservations(time)",
        "CREATE INDEX IF NOT EXISTS idx_reservations_venue ON reservations(venue_name)",
    ] {
        sqlx::query(index_sql).execute(pool).await?;
    }
    Ok(())
}

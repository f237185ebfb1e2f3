//! Database schema migrations.
//!
//! Version 1 creates the `offers` table. List-valued columns (`includes`,
//! `available_months`) hold JSON arrays; dates are `YYYY-MM-DD` text.

use rusqlite::Connection;
use tracing::info;

use wayfarer_core::error::WayfarerError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), WayfarerError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| WayfarerError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| WayfarerError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: offers");
    }

    Ok(())
}

fn apply_v1(conn: &Connection) -> Result<(), WayfarerError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS offers (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            title               TEXT NOT NULL,
            description         TEXT,
            destination         TEXT,
            country             TEXT,
            continent           TEXT,
            price               REAL NOT NULL CHECK (price >= 0),
            start_date          TEXT,
            end_date            TEXT,
            duration_days       INTEGER,
            transport_type      TEXT,
            accommodation_level TEXT,
            includes            TEXT NOT NULL DEFAULT '[]',
            available_months    TEXT NOT NULL DEFAULT '[]',
            star_rating         REAL,
            is_active           INTEGER,
            created_at          INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_offers_price
            ON offers (price);

        CREATE INDEX IF NOT EXISTS idx_offers_start_date
            ON offers (start_date)
            WHERE start_date IS NOT NULL;

        CREATE INDEX IF NOT EXISTS idx_offers_created
            ON offers (created_at DESC, id DESC);

        INSERT INTO schema_migrations (version, name) VALUES (1, 'offers');
        ",
    )
    .map_err(|e| WayfarerError::Storage(format!("Migration v1 failed: {}", e)))?;

    Ok(())
}

//! Database connection management.
//!
//! A single rusqlite `Connection` behind a `Mutex`, configured for WAL and
//! migrated on open.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::info;

use wayfarer_core::error::WayfarerError;

use crate::migrations;

/// Thread-safe SQLite database wrapper for the offer catalog.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database at the given path and run pending
    /// migrations.
    pub fn new(path: &Path) -> Result<Self, WayfarerError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| WayfarerError::Storage(format!("Failed to open database: {}", e)))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )
        .map_err(|e| WayfarerError::Storage(format!("Failed to set pragmas: {}", e)))?;

        info!("Database opened at {}", path.display());
        Self::migrated(conn)
    }

    /// Open an in-memory database (for testing and demos).
    pub fn in_memory() -> Result<Self, WayfarerError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| WayfarerError::Storage(format!("Failed to open in-memory db: {}", e)))?;
        Self::migrated(conn)
    }

    fn migrated(conn: Connection) -> Result<Self, WayfarerError> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Execute a closure with the underlying connection. The mutex is held
    /// for the duration of the closure.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, WayfarerError>
    where
        F: FnOnce(&Connection) -> Result<T, WayfarerError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| WayfarerError::Storage(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}

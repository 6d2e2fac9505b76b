use rusqlite::Connection;
use std::path::PathBuf;
use anyhow::{Context, Result};
use crate::config::Settings;
use crate::db::migrations::MigrationManager;

/// Database connection manager
pub struct DbConnection;

impl DbConnection {
    /// Get the default database path
    pub fn default_path() -> PathBuf {
        Settings::config_dir().join("board.db")
    }

    /// Get database path from settings or default
    pub fn resolve_path(settings: &Settings) -> PathBuf {
        settings.data_location.clone().unwrap_or_else(Self::default_path)
    }

    /// Connect to the database, creating it and parent directories if needed
    pub fn connect(settings: &Settings) -> Result<Connection> {
        let db_path = Self::resolve_path(settings);

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
        Self::prepare(&conn)?;

        Ok(conn)
    }

    /// Connect to an in-memory database (for testing)
    pub fn connect_in_memory() -> Result<Connection> {
        let conn = Connection::open_in_memory()
            .context("Failed to open in-memory database")?;
        Self::prepare(&conn)?;
        Ok(conn)
    }

    fn prepare(conn: &Connection) -> Result<()> {
        conn.execute_batch("PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;")
            .context("Failed to configure database connection")?;
        MigrationManager::initialize(conn)
            .context("Failed to initialize database schema")?;
        Ok(())
    }
}

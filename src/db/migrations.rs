use rusqlite::{Connection, Result};
use std::collections::HashMap;

/// Current database schema version
const CURRENT_VERSION: u32 = 2;

/// Migration system for managing database schema versions
pub struct MigrationManager;

impl MigrationManager {
    /// Initialize the database with the current schema
    /// This creates the schema_version table and applies all migrations
    pub fn initialize(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            [],
        )?;

        let current_version: u32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        for version in (current_version + 1)..=CURRENT_VERSION {
            Self::apply_migration(conn, version)?;
        }

        Ok(())
    }

    /// Apply a specific migration by version number
    fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
        let migrations = get_migrations();
        if let Some(migration) = migrations.get(&version) {
            let tx = conn.unchecked_transaction()?;
            migration(&tx)?;
            tx.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [version],
            )?;
            tx.commit()?;
            log::debug!("Applied schema migration v{}", version);
            Ok(())
        } else {
            Err(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_MISUSE),
                Some(format!("No migration found for version {}", version)),
            ))
        }
    }

    /// Get the current schema version
    pub fn get_version(conn: &Connection) -> Result<u32> {
        conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
    }
}

/// Get all migrations indexed by version
fn get_migrations() -> HashMap<u32, fn(&rusqlite::Transaction) -> Result<(), rusqlite::Error>> {
    let mut migrations: HashMap<u32, fn(&rusqlite::Transaction) -> Result<(), rusqlite::Error>> = HashMap::new();
    migrations.insert(1, migration_v1);
    migrations.insert(2, migration_v2);
    migrations
}

/// Migration v1: Initial schema
fn migration_v1(tx: &rusqlite::Transaction) -> Result<(), rusqlite::Error> {
    // Kitchen workflow stages
    tx.execute(
        "CREATE TABLE stages (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            sequence INTEGER NOT NULL DEFAULT 10,
            is_done_stage INTEGER NOT NULL DEFAULT 0,
            is_ready_stage INTEGER NOT NULL DEFAULT 0,
            fold INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    // Order sources (point-of-sale terminals)
    tx.execute(
        "CREATE TABLE sources (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        )",
        [],
    )?;

    // Product catalog. Categories hang off the template, not the product.
    tx.execute(
        "CREATE TABLE categories (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        )",
        [],
    )?;
    tx.execute(
        "CREATE TABLE product_templates (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            has_recipe INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;
    tx.execute(
        "CREATE TABLE template_categories (
            template_id INTEGER NOT NULL REFERENCES product_templates(id) ON DELETE CASCADE,
            category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
            PRIMARY KEY(template_id, category_id)
        )",
        [],
    )?;
    tx.execute(
        "CREATE TABLE products (
            id INTEGER PRIMARY KEY,
            template_id INTEGER NOT NULL REFERENCES product_templates(id) ON DELETE CASCADE,
            name TEXT NOT NULL
        )",
        [],
    )?;

    // Orders. state is the upstream order state; kitchen_state is ours.
    tx.execute(
        "CREATE TABLE orders (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            pos_reference TEXT NULL,
            source_id INTEGER NULL REFERENCES sources(id),
            table_name TEXT NULL,
            state TEXT NOT NULL DEFAULT 'paid',
            kitchen_state TEXT NOT NULL DEFAULT 'new'
                CHECK(kitchen_state IN ('new','in_progress','ready','done')),
            date_order TEXT NOT NULL
        )",
        [],
    )?;
    tx.execute(
        "CREATE INDEX idx_orders_date_order ON orders(date_order)",
        [],
    )?;
    tx.execute(
        "CREATE INDEX idx_orders_source ON orders(source_id)",
        [],
    )?;

    tx.execute(
        "CREATE TABLE order_lines (
            id INTEGER PRIMARY KEY,
            order_id INTEGER NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
            product_id INTEGER NOT NULL REFERENCES products(id),
            qty REAL NOT NULL,
            kitchen_stage_id INTEGER NULL REFERENCES stages(id) ON DELETE SET NULL
        )",
        [],
    )?;
    tx.execute(
        "CREATE INDEX idx_order_lines_order ON order_lines(order_id)",
        [],
    )?;

    // Kitchen displays and their allow-lists (empty list = everything)
    tx.execute(
        "CREATE TABLE displays (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            sla_warning INTEGER NULL,
            sla_critical INTEGER NULL,
            sound_enabled INTEGER NULL
        )",
        [],
    )?;
    tx.execute(
        "CREATE TABLE display_sources (
            display_id INTEGER NOT NULL REFERENCES displays(id) ON DELETE CASCADE,
            source_id INTEGER NOT NULL REFERENCES sources(id) ON DELETE CASCADE,
            PRIMARY KEY(display_id, source_id)
        )",
        [],
    )?;
    tx.execute(
        "CREATE TABLE display_categories (
            display_id INTEGER NOT NULL REFERENCES displays(id) ON DELETE CASCADE,
            category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
            PRIMARY KEY(display_id, category_id)
        )",
        [],
    )?;

    // Push bus. Listeners poll by id, so ids must never be reused.
    tx.execute(
        "CREATE TABLE bus (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            channel TEXT NOT NULL,
            message TEXT NOT NULL,
            created_ts INTEGER NOT NULL
        )",
        [],
    )?;
    tx.execute(
        "CREATE INDEX idx_bus_channel_id ON bus(channel, id)",
        [],
    )?;

    Ok(())
}

/// Migration v2: Seed the default kitchen stages
fn migration_v2(tx: &rusqlite::Transaction) -> Result<(), rusqlite::Error> {
    let defaults: [(&str, i64, bool); 3] = [
        ("New", 10, false),
        ("Preparing", 20, false),
        ("Done", 30, true),
    ];
    for (name, sequence, is_done) in defaults {
        tx.execute(
            "INSERT INTO stages (name, sequence, is_done_stage) VALUES (?1, ?2, ?3)",
            rusqlite::params![name, sequence, is_done],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_migration_applies_cleanly() {
        let conn = Connection::open_in_memory().unwrap();
        MigrationManager::initialize(&conn).unwrap();

        let version = MigrationManager::get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migration_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        MigrationManager::initialize(&conn).unwrap();
        MigrationManager::initialize(&conn).unwrap();

        let version = MigrationManager::get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);

        let stages: i64 = conn
            .query_row("SELECT COUNT(*) FROM stages", [], |row| row.get(0))
            .unwrap();
        assert_eq!(stages, 3);
    }

    #[test]
    fn test_default_stages_seeded() {
        let conn = Connection::open_in_memory().unwrap();
        MigrationManager::initialize(&conn).unwrap();

        let done: String = conn
            .query_row("SELECT name FROM stages WHERE is_done_stage = 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(done, "Done");
    }

    #[test]
    fn test_kitchen_state_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        MigrationManager::initialize(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO orders (name, kitchen_state, date_order) VALUES ('A', 'cooking', '2026-01-01')",
            [],
        );
        assert!(result.is_err());
    }
}

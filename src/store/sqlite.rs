use anyhow::Result;
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};

use crate::config::Settings;
use crate::db::DbConnection;
use crate::models::{CategoryMap, CompletionState, Display, RawLine, RawOrder, Stage};
use crate::repo::{BusRepo, CatalogRepo, DisplayRepo, LineRepo, OrderRepo, StageRepo};
use crate::store::{BackingStore, OrderQuery, PushMessage, PushSource, TimeSource};

/// SQLite-backed store, time source and push bus
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn: Mutex::new(conn) }
    }

    pub fn open(settings: &Settings) -> Result<Self> {
        Ok(Self::new(DbConnection::connect(settings)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(DbConnection::connect_in_memory()?))
    }

    /// Run `f` with exclusive access to the connection
    pub fn with_conn<R>(&self, f: impl FnOnce(&Connection) -> Result<R>) -> Result<R> {
        f(&self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock leaves SQLite itself consistent
        self.conn.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl BackingStore for SqliteStore {
    fn load_stages(&self) -> Result<Vec<Stage>> {
        StageRepo::list_all(&self.lock())
    }

    fn list_displays(&self) -> Result<Vec<Display>> {
        DisplayRepo::list_all(&self.lock())
    }

    fn get_display(&self, id: i64) -> Result<Option<Display>> {
        DisplayRepo::get_by_id(&self.lock(), id)
    }

    fn fetch_orders(&self, query: &OrderQuery) -> Result<Vec<RawOrder>> {
        OrderRepo::fetch(&self.lock(), query)
    }

    fn fetch_lines(&self, line_ids: &[i64]) -> Result<Vec<RawLine>> {
        LineRepo::fetch(&self.lock(), line_ids)
    }

    fn resolve_categories(&self, product_ids: &[i64]) -> Result<CategoryMap> {
        CatalogRepo::resolve_categories(&self.lock(), product_ids)
    }

    fn write_line_stage(&self, line_id: i64, stage_id: i64) -> Result<()> {
        LineRepo::set_stage(&self.lock(), line_id, stage_id)
    }

    fn write_order_state(&self, order_id: i64, state: CompletionState) -> Result<()> {
        OrderRepo::set_kitchen_state(&self.lock(), order_id, state)
    }
}

impl TimeSource for SqliteStore {
    fn server_time(&self) -> Result<String> {
        let now = self.lock().query_row(
            "SELECT strftime('%Y-%m-%d %H:%M:%f', 'now')",
            [],
            |row| row.get(0),
        )?;
        Ok(now)
    }
}

impl PushSource for SqliteStore {
    fn latest_message_id(&self, channel: &str) -> Result<i64> {
        BusRepo::latest_id(&self.lock(), channel)
    }

    fn poll_messages(&self, channel: &str, after_id: i64) -> Result<Vec<PushMessage>> {
        BusRepo::poll(&self.lock(), channel, after_id)
    }
}

use rusqlite::{Connection, OptionalExtension};
use crate::models::Display;
use anyhow::{Context, Result};
use std::collections::BTreeSet;

pub struct DisplayRepo;

impl DisplayRepo {
    /// Create a display with its allow-lists and optional overrides
    pub fn create(
        conn: &Connection,
        name: &str,
        source_ids: &BTreeSet<i64>,
        category_ids: &BTreeSet<i64>,
        sla_warning: Option<i64>,
        sla_critical: Option<i64>,
        sound_enabled: Option<bool>,
    ) -> Result<Display> {
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO displays (name, sla_warning, sla_critical, sound_enabled)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![name, sla_warning, sla_critical, sound_enabled],
        )
        .with_context(|| format!("Failed to create display: {}", name))?;
        let id = tx.last_insert_rowid();

        for source_id in source_ids {
            tx.execute(
                "INSERT INTO display_sources (display_id, source_id) VALUES (?1, ?2)",
                rusqlite::params![id, source_id],
            )
            .with_context(|| format!("Unknown source {}", source_id))?;
        }
        for category_id in category_ids {
            tx.execute(
                "INSERT INTO display_categories (display_id, category_id) VALUES (?1, ?2)",
                rusqlite::params![id, category_id],
            )
            .with_context(|| format!("Unknown category {}", category_id))?;
        }
        tx.commit()?;

        Ok(Display {
            id,
            name: name.to_string(),
            allowed_source_ids: source_ids.clone(),
            allowed_category_ids: category_ids.clone(),
            sla_warning_minutes: sla_warning,
            sla_critical_minutes: sla_critical,
            sound_enabled,
        })
    }

    /// Get display by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<Display>> {
        let display = conn
            .query_row(
                "SELECT id, name, sla_warning, sla_critical, sound_enabled FROM displays WHERE id = ?1",
                [id],
                |row| {
                    Ok(Display {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        allowed_source_ids: BTreeSet::new(),
                        allowed_category_ids: BTreeSet::new(),
                        sla_warning_minutes: row.get(2)?,
                        sla_critical_minutes: row.get(3)?,
                        sound_enabled: row.get(4)?,
                    })
                },
            )
            .optional()?;

        match display {
            Some(mut display) => {
                Self::load_allow_lists(conn, &mut display)?;
                Ok(Some(display))
            }
            None => Ok(None),
        }
    }

    /// List all displays ordered by name
    pub fn list_all(conn: &Connection) -> Result<Vec<Display>> {
        let mut stmt = conn.prepare("SELECT id FROM displays ORDER BY name, id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;

        let mut displays = Vec::new();
        for id in ids {
            if let Some(display) = Self::get_by_id(conn, id)? {
                displays.push(display);
            }
        }
        Ok(displays)
    }

    /// Delete a display; returns false if it did not exist
    pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
        let deleted = conn
            .execute("DELETE FROM displays WHERE id = ?1", [id])
            .with_context(|| format!("Failed to delete display {}", id))?;
        Ok(deleted > 0)
    }

    fn load_allow_lists(conn: &Connection, display: &mut Display) -> Result<()> {
        let mut stmt = conn.prepare("SELECT source_id FROM display_sources WHERE display_id = ?1")?;
        display.allowed_source_ids = stmt
            .query_map([display.id], |row| row.get(0))?
            .collect::<rusqlite::Result<BTreeSet<i64>>>()?;

        let mut stmt = conn.prepare("SELECT category_id FROM display_categories WHERE display_id = ?1")?;
        display.allowed_category_ids = stmt
            .query_map([display.id], |row| row.get(0))?
            .collect::<rusqlite::Result<BTreeSet<i64>>>()?;
        Ok(())
    }
}

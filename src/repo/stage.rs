use rusqlite::Connection;
use crate::models::Stage;
use anyhow::{Context, Result};

pub struct StageRepo;

impl StageRepo {
    /// List all stages in pipeline order
    pub fn list_all(conn: &Connection) -> Result<Vec<Stage>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, sequence, is_done_stage, is_ready_stage, fold
             FROM stages ORDER BY sequence, id"
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(Stage {
                id: row.get(0)?,
                name: row.get(1)?,
                sequence: row.get(2)?,
                is_terminal: row.get(3)?,
                is_ready: row.get(4)?,
                fold: row.get(5)?,
            })
        })?;

        let mut stages = Vec::new();
        for row in rows {
            stages.push(row?);
        }
        Ok(stages)
    }

    /// Create a stage
    pub fn create(
        conn: &Connection,
        name: &str,
        sequence: i64,
        is_terminal: bool,
        is_ready: bool,
        fold: bool,
    ) -> Result<Stage> {
        conn.execute(
            "INSERT INTO stages (name, sequence, is_done_stage, is_ready_stage, fold)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![name, sequence, is_terminal, is_ready, fold],
        )
        .with_context(|| format!("Failed to create stage: {}", name))?;

        Ok(Stage {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            sequence,
            is_terminal,
            is_ready,
            fold,
        })
    }

    /// Remove every stage (used when replacing the default pipeline)
    pub fn delete_all(conn: &Connection) -> Result<usize> {
        conn.execute("DELETE FROM stages", [])
            .context("Failed to delete stages")
    }
}

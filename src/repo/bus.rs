use rusqlite::Connection;
use crate::store::PushMessage;
use anyhow::{Context, Result};

/// Upper bound on messages returned by one poll
const POLL_BATCH: i64 = 100;

/// Push bus persisted as an append-only table
pub struct BusRepo;

impl BusRepo {
    /// Publish a message; returns its id
    pub fn send(conn: &Connection, channel: &str, payload: &serde_json::Value) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();
        conn.execute(
            "INSERT INTO bus (channel, message, created_ts) VALUES (?1, ?2, ?3)",
            rusqlite::params![channel, serde_json::to_string(payload)?, now],
        )
        .with_context(|| format!("Failed to publish on channel '{}'", channel))?;
        Ok(conn.last_insert_rowid())
    }

    pub fn latest_id(conn: &Connection, channel: &str) -> Result<i64> {
        let id = conn.query_row(
            "SELECT COALESCE(MAX(id), 0) FROM bus WHERE channel = ?1",
            [channel],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Messages after `after_id`, oldest first
    pub fn poll(conn: &Connection, channel: &str, after_id: i64) -> Result<Vec<PushMessage>> {
        let mut stmt = conn.prepare(
            "SELECT id, channel, message FROM bus
             WHERE channel = ?1 AND id > ?2
             ORDER BY id LIMIT ?3"
        )?;
        let rows = stmt.query_map(rusqlite::params![channel, after_id, POLL_BATCH], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })?;

        let mut messages = Vec::new();
        for row in rows {
            let (id, channel, message) = row?;
            // A malformed payload still counts as a ping
            let payload = serde_json::from_str(&message).unwrap_or_else(|e| {
                log::warn!("Bus message {} has an unreadable payload: {}", id, e);
                serde_json::Value::Null
            });
            messages.push(PushMessage { id, channel, payload });
        }
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConnection;
    use serde_json::json;

    #[test]
    fn test_send_and_poll() {
        let conn = DbConnection::connect_in_memory().unwrap();
        assert_eq!(BusRepo::latest_id(&conn, "kitchen_new_order").unwrap(), 0);

        let first = BusRepo::send(&conn, "kitchen_new_order", &json!({"order_id": 1, "name": "A"})).unwrap();
        BusRepo::send(&conn, "other", &json!({})).unwrap();
        let third = BusRepo::send(&conn, "kitchen_new_order", &json!({"order_id": 2, "name": "B"})).unwrap();

        let all = BusRepo::poll(&conn, "kitchen_new_order", 0).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].order_name(), Some("A"));

        let newer = BusRepo::poll(&conn, "kitchen_new_order", first).unwrap();
        assert_eq!(newer.len(), 1);
        assert_eq!(newer[0].id, third);
        assert_eq!(BusRepo::latest_id(&conn, "kitchen_new_order").unwrap(), third);
    }

    #[test]
    fn test_malformed_payload_still_delivered() {
        let conn = DbConnection::connect_in_memory().unwrap();
        conn.execute(
            "INSERT INTO bus (channel, message, created_ts) VALUES ('kitchen_new_order', '{oops', 0)",
            [],
        )
        .unwrap();
        let messages = BusRepo::poll(&conn, "kitchen_new_order", 0).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].payload, serde_json::Value::Null);
    }
}

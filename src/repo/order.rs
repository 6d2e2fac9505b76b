use rusqlite::{Connection, OptionalExtension};
use crate::models::{CompletionState, RawLine, RawOrder};
use crate::repo::catalog::placeholders;
use crate::store::OrderQuery;
use crate::utils::format_wire_timestamp;
use anyhow::{Context, Result};

/// Order as submitted by the upstream system
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub name: String,
    pub pos_reference: Option<String>,
    pub source_id: Option<i64>,
    pub table: Option<String>,
    pub state: String,
    /// Wire timestamp; naive values are UTC
    pub date_order: String,
    /// (product_id, quantity)
    pub lines: Vec<(i64, f64)>,
}

pub struct OrderRepo;

impl OrderRepo {
    /// Insert an order and its lines; returns the order id
    pub fn create(conn: &Connection, order: &NewOrder) -> Result<i64> {
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO orders (name, pos_reference, source_id, table_name, state, date_order)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                order.name,
                order.pos_reference,
                order.source_id,
                order.table,
                order.state,
                order.date_order,
            ],
        )
        .with_context(|| format!("Failed to create order: {}", order.name))?;
        let order_id = tx.last_insert_rowid();

        for (product_id, qty) in &order.lines {
            tx.execute(
                "INSERT INTO order_lines (order_id, product_id, qty) VALUES (?1, ?2, ?3)",
                rusqlite::params![order_id, product_id, qty],
            )
            .with_context(|| format!("Failed to add product {} to order {}", product_id, order.name))?;
        }
        tx.commit()?;

        Ok(order_id)
    }

    /// Fetch the order stream, newest first.
    /// Time comparisons go through julianday() so naive and zoned values sort together.
    pub fn fetch(conn: &Connection, query: &OrderQuery) -> Result<Vec<RawOrder>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if !query.states.is_empty() {
            let start = params.len();
            let marks: Vec<String> = (1..=query.states.len()).map(|i| format!("?{}", start + i)).collect();
            clauses.push(format!("state IN ({})", marks.join(", ")));
            for state in &query.states {
                params.push(Box::new(state.clone()));
            }
        }
        if !query.source_ids.is_empty() {
            let start = params.len();
            let marks: Vec<String> = (1..=query.source_ids.len()).map(|i| format!("?{}", start + i)).collect();
            clauses.push(format!("source_id IN ({})", marks.join(", ")));
            for source_id in &query.source_ids {
                params.push(Box::new(*source_id));
            }
        }
        if let Some(since) = &query.since {
            clauses.push(format!("julianday(date_order) >= julianday(?{})", params.len() + 1));
            params.push(Box::new(format_wire_timestamp(since)));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT id, name, pos_reference, source_id, table_name, date_order, kitchen_state
             FROM orders {}
             ORDER BY julianday(date_order) DESC, id DESC
             LIMIT ?{}",
            where_sql,
            params.len() + 1
        );
        params.push(Box::new(query.limit as i64));

        let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            Ok(RawOrder {
                id: row.get(0)?,
                name: row.get(1)?,
                pos_reference: row.get(2)?,
                source_id: row.get(3)?,
                table: row.get(4)?,
                created_at: row.get(5)?,
                completion_state: row.get(6)?,
                line_ids: Vec::new(),
            })
        })?;

        let mut orders = Vec::new();
        for row in rows {
            orders.push(row?);
        }

        let mut line_stmt = conn.prepare("SELECT id FROM order_lines WHERE order_id = ?1 ORDER BY id")?;
        for order in &mut orders {
            order.line_ids = line_stmt
                .query_map([order.id], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<i64>>>()?;
        }

        Ok(orders)
    }

    /// Write the kitchen completion state of an order
    pub fn set_kitchen_state(conn: &Connection, order_id: i64, state: CompletionState) -> Result<()> {
        let updated = conn
            .execute(
                "UPDATE orders SET kitchen_state = ?1 WHERE id = ?2",
                rusqlite::params![state.as_str(), order_id],
            )
            .with_context(|| format!("Failed to update order {}", order_id))?;
        if updated == 0 {
            anyhow::bail!("No order found with id={}", order_id);
        }
        Ok(())
    }

    pub fn get_kitchen_state(conn: &Connection, order_id: i64) -> Result<Option<CompletionState>> {
        let state: Option<String> = conn
            .query_row("SELECT kitchen_state FROM orders WHERE id = ?1", [order_id], |row| row.get(0))
            .optional()?;
        Ok(state.as_deref().and_then(CompletionState::from_str))
    }

    /// Upstream order state change (e.g. draft -> paid); returns the order name
    pub fn set_upstream_state(conn: &Connection, order_id: i64, state: &str) -> Result<String> {
        let updated = conn
            .execute(
                "UPDATE orders SET state = ?1 WHERE id = ?2",
                rusqlite::params![state, order_id],
            )
            .with_context(|| format!("Failed to update order {}", order_id))?;
        if updated == 0 {
            anyhow::bail!("No order found with id={}", order_id);
        }
        let name = conn.query_row("SELECT name FROM orders WHERE id = ?1", [order_id], |row| row.get(0))?;
        Ok(name)
    }
}

pub struct LineRepo;

impl LineRepo {
    /// Fetch lines with their product name and recipe flag
    pub fn fetch(conn: &Connection, line_ids: &[i64]) -> Result<Vec<RawLine>> {
        if line_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT l.id, l.order_id, l.product_id, p.name, l.qty, l.kitchen_stage_id, t.has_recipe
             FROM order_lines l
             JOIN products p ON p.id = l.product_id
             JOIN product_templates t ON t.id = p.template_id
             WHERE l.id IN ({})
             ORDER BY l.id",
            placeholders(line_ids.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(line_ids), |row| {
            Ok(RawLine {
                id: row.get(0)?,
                order_id: row.get(1)?,
                product_id: row.get(2)?,
                product_name: row.get(3)?,
                quantity: row.get(4)?,
                stage_id: row.get(5)?,
                has_recipe: row.get(6)?,
            })
        })?;

        let mut lines = Vec::new();
        for row in rows {
            lines.push(row?);
        }
        Ok(lines)
    }

    /// Write the kitchen stage of a single line
    pub fn set_stage(conn: &Connection, line_id: i64, stage_id: i64) -> Result<()> {
        let updated = conn
            .execute(
                "UPDATE order_lines SET kitchen_stage_id = ?1 WHERE id = ?2",
                rusqlite::params![stage_id, line_id],
            )
            .with_context(|| format!("Failed to move line {} to stage {}", line_id, stage_id))?;
        if updated == 0 {
            anyhow::bail!("No order line found with id={}", line_id);
        }
        Ok(())
    }

    pub fn get_stage(conn: &Connection, line_id: i64) -> Result<Option<i64>> {
        let stage: Option<Option<i64>> = conn
            .query_row("SELECT kitchen_stage_id FROM order_lines WHERE id = ?1", [line_id], |row| row.get(0))
            .optional()?;
        Ok(stage.flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConnection;
    use crate::repo::CatalogRepo;
    use std::collections::BTreeSet;

    fn order(name: &str, source_id: Option<i64>, date_order: &str, lines: Vec<(i64, f64)>) -> NewOrder {
        NewOrder {
            name: name.to_string(),
            pos_reference: None,
            source_id,
            table: None,
            state: "paid".to_string(),
            date_order: date_order.to_string(),
            lines,
        }
    }

    fn query() -> OrderQuery {
        OrderQuery {
            source_ids: BTreeSet::new(),
            since: None,
            limit: 20,
            states: vec!["paid".to_string()],
        }
    }

    #[test]
    fn test_fetch_newest_first_with_mixed_formats() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let soup = CatalogRepo::create_product(&conn, "Soup", &BTreeSet::new(), false).unwrap();

        OrderRepo::create(&conn, &order("A", None, "2026-05-01 10:00:00", vec![(soup, 1.0)])).unwrap();
        OrderRepo::create(&conn, &order("B", None, "2026-05-01T12:30:00+02:00", vec![])).unwrap();
        OrderRepo::create(&conn, &order("C", None, "2026-05-01 11:00:00", vec![(soup, 2.0), (soup, 1.0)])).unwrap();

        let orders = OrderRepo::fetch(&conn, &query()).unwrap();
        let names: Vec<&str> = orders.iter().map(|o| o.name.as_str()).collect();
        // B is 10:30 UTC
        assert_eq!(names, vec!["C", "B", "A"]);
        assert_eq!(orders[0].line_ids.len(), 2);
        assert_eq!(orders[0].completion_state.as_deref(), Some("new"));
    }

    #[test]
    fn test_fetch_source_state_window_and_limit() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let front = CatalogRepo::create_source(&conn, "Front").unwrap();
        let back = CatalogRepo::create_source(&conn, "Back").unwrap();

        OrderRepo::create(&conn, &order("front-old", Some(front), "2026-05-01 08:00:00", vec![])).unwrap();
        OrderRepo::create(&conn, &order("front-new", Some(front), "2026-05-01 12:00:00", vec![])).unwrap();
        OrderRepo::create(&conn, &order("back", Some(back), "2026-05-01 12:00:00", vec![])).unwrap();
        let mut draft = order("draft", Some(front), "2026-05-01 12:00:00", vec![]);
        draft.state = "draft".to_string();
        OrderRepo::create(&conn, &draft).unwrap();

        let mut q = query();
        q.source_ids = BTreeSet::from([front]);
        let names: Vec<String> = OrderRepo::fetch(&conn, &q).unwrap().into_iter().map(|o| o.name).collect();
        assert_eq!(names, vec!["front-new", "front-old"]);

        q.since = Some(crate::utils::parse_wire_timestamp("2026-05-01 10:00:00").unwrap());
        let names: Vec<String> = OrderRepo::fetch(&conn, &q).unwrap().into_iter().map(|o| o.name).collect();
        assert_eq!(names, vec!["front-new"]);

        let mut q = query();
        q.limit = 1;
        assert_eq!(OrderRepo::fetch(&conn, &q).unwrap().len(), 1);
    }

    #[test]
    fn test_line_stage_round_trip() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let soup = CatalogRepo::create_product(&conn, "Soup", &BTreeSet::new(), true).unwrap();
        OrderRepo::create(&conn, &order("A", None, "2026-05-01 10:00:00", vec![(soup, 3.0)])).unwrap();

        let orders = OrderRepo::fetch(&conn, &query()).unwrap();
        let line_id = orders[0].line_ids[0];

        let lines = LineRepo::fetch(&conn, &[line_id]).unwrap();
        assert_eq!(lines[0].product_name, "Soup");
        assert_eq!(lines[0].quantity, 3.0);
        assert_eq!(lines[0].stage_id, None);
        assert!(lines[0].has_recipe);

        let stage_id: i64 = conn.query_row("SELECT MAX(id) FROM stages", [], |row| row.get(0)).unwrap();
        LineRepo::set_stage(&conn, line_id, stage_id).unwrap();
        assert_eq!(LineRepo::get_stage(&conn, line_id).unwrap(), Some(stage_id));
        assert!(LineRepo::set_stage(&conn, 9999, stage_id).is_err());
    }

    #[test]
    fn test_kitchen_state_round_trip() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let id = OrderRepo::create(&conn, &order("A", None, "2026-05-01 10:00:00", vec![])).unwrap();

        OrderRepo::set_kitchen_state(&conn, id, CompletionState::Ready).unwrap();
        assert_eq!(OrderRepo::get_kitchen_state(&conn, id).unwrap(), Some(CompletionState::Ready));
        assert!(OrderRepo::set_kitchen_state(&conn, 999, CompletionState::Done).is_err());
    }
}

// Master data the board reads but does not own: sources, categories, products.
// The create functions stand in for the upstream system in dev and tests.

use rusqlite::Connection;
use crate::models::CategoryMap;
use anyhow::{Context, Result};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub id: i64,
    pub name: String,
}

pub struct CatalogRepo;

impl CatalogRepo {
    pub fn create_source(conn: &Connection, name: &str) -> Result<i64> {
        conn.execute("INSERT INTO sources (name) VALUES (?1)", [name])
            .with_context(|| format!("Failed to create source: {}", name))?;
        Ok(conn.last_insert_rowid())
    }

    pub fn create_category(conn: &Connection, name: &str) -> Result<i64> {
        conn.execute("INSERT INTO categories (name) VALUES (?1)", [name])
            .with_context(|| format!("Failed to create category: {}", name))?;
        Ok(conn.last_insert_rowid())
    }

    /// Create a product together with its template; returns the product id
    pub fn create_product(
        conn: &Connection,
        name: &str,
        category_ids: &BTreeSet<i64>,
        has_recipe: bool,
    ) -> Result<i64> {
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO product_templates (name, has_recipe) VALUES (?1, ?2)",
            rusqlite::params![name, has_recipe],
        )
        .with_context(|| format!("Failed to create product template: {}", name))?;
        let template_id = tx.last_insert_rowid();

        for category_id in category_ids {
            tx.execute(
                "INSERT INTO template_categories (template_id, category_id) VALUES (?1, ?2)",
                rusqlite::params![template_id, category_id],
            )
            .with_context(|| format!("Unknown category {}", category_id))?;
        }

        tx.execute(
            "INSERT INTO products (template_id, name) VALUES (?1, ?2)",
            rusqlite::params![template_id, name],
        )
        .with_context(|| format!("Failed to create product: {}", name))?;
        let product_id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(product_id)
    }

    pub fn list_sources(conn: &Connection) -> Result<Vec<CatalogEntry>> {
        Self::list(conn, "SELECT id, name FROM sources ORDER BY id")
    }

    pub fn list_categories(conn: &Connection) -> Result<Vec<CatalogEntry>> {
        Self::list(conn, "SELECT id, name FROM categories ORDER BY id")
    }

    pub fn list_products(conn: &Connection) -> Result<Vec<CatalogEntry>> {
        Self::list(conn, "SELECT id, name FROM products ORDER BY id")
    }

    fn list(conn: &Connection, sql: &str) -> Result<Vec<CatalogEntry>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(CatalogEntry { id: row.get(0)?, name: row.get(1)? })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Resolve product -> template -> categories for the given products.
    /// Products without categories are present with an empty set.
    pub fn resolve_categories(conn: &Connection, product_ids: &[i64]) -> Result<CategoryMap> {
        let mut map: CategoryMap = product_ids.iter().map(|id| (*id, BTreeSet::new())).collect();
        if product_ids.is_empty() {
            return Ok(map);
        }

        let sql = format!(
            "SELECT p.id, tc.category_id
             FROM products p
             JOIN template_categories tc ON tc.template_id = p.template_id
             WHERE p.id IN ({})",
            placeholders(product_ids.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(product_ids), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (product_id, category_id) = row?;
            map.entry(product_id).or_default().insert(category_id);
        }
        Ok(map)
    }
}

/// `?1, ?2, ...` for an IN list of `n` values
pub(crate) fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ")
}

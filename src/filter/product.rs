// Product tally and the operator's single-product focus

use serde::Serialize;
use std::collections::HashMap;

use crate::models::Order;

/// Total quantity of one product across the visible orders
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductTally {
    pub product_id: i64,
    pub name: String,
    pub quantity: f64,
}

/// Sum quantities per product, sorted by name
pub fn tally_products(orders: &[Order]) -> Vec<ProductTally> {
    let mut totals: HashMap<i64, ProductTally> = HashMap::new();
    for line in orders.iter().flat_map(|o| o.lines.iter()) {
        // Placeholder lines carry product 0
        if line.product_id == 0 {
            continue;
        }
        totals
            .entry(line.product_id)
            .or_insert_with(|| ProductTally {
                product_id: line.product_id,
                name: line.product_name.clone(),
                quantity: 0.0,
            })
            .quantity += line.quantity;
    }

    let mut tallies: Vec<ProductTally> = totals.into_values().collect();
    tallies.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then(a.product_id.cmp(&b.product_id))
    });
    tallies
}

/// At most one focused product; toggling the same product clears it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProductFocus(Option<i64>);

impl ProductFocus {
    pub fn product(&self) -> Option<i64> {
        self.0
    }

    pub fn toggle(&mut self, product_id: i64) {
        self.0 = if self.0 == Some(product_id) { None } else { Some(product_id) };
    }

    pub fn clear(&mut self) {
        self.0 = None;
    }

    /// Orders containing the focused product (all orders without a focus)
    pub fn matches(&self, order: &Order) -> bool {
        match self.0 {
            None => true,
            Some(product_id) => order.lines.iter().any(|l| l.product_id == product_id),
        }
    }
}

// Per-display narrowing of the order stream

use crate::models::{Display, Order};

/// Narrow `orders` to what `display` may show.
///
/// Orders from sources outside the display's allow-list are dropped first
/// (the order query already excludes them; the check keeps this function
/// correct on its own). Then lines outside the category allow-list are
/// set aside as hidden (they still drive the order state), and orders left
/// without visible lines are dropped.
pub fn filter_orders(orders: Vec<Order>, display: &Display) -> Vec<Order> {
    orders
        .into_iter()
        .filter(|order| display.allows_source(order.source_id))
        .filter_map(|mut order| {
            let mut lines = std::mem::take(&mut order.lines);
            lines.append(&mut order.hidden_lines);
            let (shown, hidden): (Vec<_>, Vec<_>) = lines
                .into_iter()
                .partition(|line| display.allows_categories(&line.category_ids));
            order.lines = shown;
            order.hidden_lines = hidden;
            if order.lines.is_empty() {
                None
            } else {
                Some(order)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompletionState, OrderLine};
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn line(id: i64, categories: &[i64], quantity: f64) -> OrderLine {
        OrderLine {
            id,
            product_id: id * 10,
            product_name: format!("Product {}", id),
            quantity,
            category_ids: categories.iter().copied().collect(),
            current_stage_id: 1,
            stage_assigned: false,
            has_recipe: false,
        }
    }

    fn order(id: i64, source_id: Option<i64>, lines: Vec<OrderLine>) -> Order {
        Order {
            id,
            display_reference: format!("Order {}", id),
            source_id,
            table: None,
            created_at: Utc::now(),
            lines,
            hidden_lines: Vec::new(),
            completion_state: CompletionState::New,
        }
    }

    #[test]
    fn test_category_narrowing_keeps_matching_line() {
        let mut display = Display::new(1, "Hot line");
        display.allowed_category_ids = BTreeSet::from([5]);

        let orders = vec![order(1, None, vec![line(1, &[5], 2.0), line(2, &[9], 1.0)])];
        let visible = filter_orders(orders, &display);

        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].lines.len(), 1);
        assert_eq!(visible[0].lines[0].category_ids, BTreeSet::from([5]));
        assert_eq!(visible[0].lines[0].quantity, 2.0);
        assert_eq!(visible[0].hidden_lines.len(), 1);
        assert_eq!(visible[0].hidden_lines[0].id, 2);
    }

    #[test]
    fn test_orders_without_visible_lines_dropped() {
        let mut display = Display::new(1, "Bar");
        display.allowed_category_ids = BTreeSet::from([5]);

        let orders = vec![
            order(1, None, vec![line(1, &[9], 1.0)]),
            order(2, None, vec![]),
            order(3, None, vec![line(2, &[], 1.0)]),
        ];
        assert!(filter_orders(orders, &display).is_empty());
    }

    #[test]
    fn test_empty_display_is_pass_through_except_empty_orders() {
        let display = Display::new(1, "Everything");
        let orders = vec![
            order(1, Some(3), vec![line(1, &[9], 1.0), line(2, &[], 1.0)]),
            order(2, None, vec![]),
        ];
        let visible = filter_orders(orders, &display);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].lines.len(), 2);
    }

    #[test]
    fn test_source_prefilter() {
        let mut display = Display::new(1, "Terrace");
        display.allowed_source_ids = BTreeSet::from([2]);

        let orders = vec![
            order(1, Some(2), vec![line(1, &[], 1.0)]),
            order(2, Some(3), vec![line(2, &[], 1.0)]),
            order(3, None, vec![line(3, &[], 1.0)]),
        ];
        let ids: Vec<i64> = filter_orders(orders, &display).iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let mut display = Display::new(1, "Grill");
        display.allowed_category_ids = BTreeSet::from([5, 6]);
        display.allowed_source_ids = BTreeSet::from([1]);

        let orders = vec![
            order(1, Some(1), vec![line(1, &[5], 1.0), line(2, &[7], 1.0)]),
            order(2, Some(1), vec![line(3, &[7], 1.0)]),
            order(3, Some(2), vec![line(4, &[6], 1.0)]),
            order(4, Some(1), vec![line(5, &[6, 7], 1.0)]),
        ];
        let once = filter_orders(orders, &display);
        let twice = filter_orders(once.clone(), &display);
        assert_eq!(once, twice);
    }
}

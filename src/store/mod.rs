//! Seams to the systems the board does not own.
//!
//! The backing store is the sole arbiter of order state; the board only
//! reads it and issues single-record writes. The time source and push bus
//! are separate traits because a deployment may serve them from elsewhere.

pub mod sqlite;

pub use sqlite::SqliteStore;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::{CategoryMap, CompletionState, Display, RawLine, RawOrder, Stage};

/// Parameters of the order-stream query
#[derive(Debug, Clone, PartialEq)]
pub struct OrderQuery {
    /// Empty = every source
    pub source_ids: BTreeSet<i64>,
    /// Lower bound of the time window
    pub since: Option<DateTime<Utc>>,
    pub limit: usize,
    /// Upstream order states to include; empty = every state
    pub states: Vec<String>,
}

pub trait BackingStore: Send + Sync {
    fn load_stages(&self) -> Result<Vec<Stage>>;

    fn list_displays(&self) -> Result<Vec<Display>>;

    fn get_display(&self, id: i64) -> Result<Option<Display>>;

    /// Newest orders first
    fn fetch_orders(&self, query: &OrderQuery) -> Result<Vec<RawOrder>>;

    fn fetch_lines(&self, line_ids: &[i64]) -> Result<Vec<RawLine>>;

    /// Product -> template -> category set
    fn resolve_categories(&self, product_ids: &[i64]) -> Result<CategoryMap>;

    fn write_line_stage(&self, line_id: i64, stage_id: i64) -> Result<()>;

    fn write_order_state(&self, order_id: i64, state: CompletionState) -> Result<()>;

    /// Best-effort batch: every line write is attempted even if an earlier
    /// one fails, then the order write. Returns the first error seen.
    fn write_reset(
        &self,
        order_id: i64,
        line_ids: &[i64],
        stage_id: i64,
        state: CompletionState,
    ) -> Result<()> {
        let mut first_error = None;
        for line_id in line_ids {
            if let Err(e) = self.write_line_stage(*line_id, stage_id) {
                log::error!("Reset of line {} failed: {:#}", line_id, e);
                first_error = first_error.or(Some(e));
            }
        }
        if let Err(e) = self.write_order_state(order_id, state) {
            log::error!("Reset of order {} failed: {:#}", order_id, e);
            first_error = first_error.or(Some(e));
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// External clock used to correct client drift
pub trait TimeSource: Send + Sync {
    /// Current server time as a wire string (`YYYY-MM-DD HH:MM:SS[.fff]`, UTC)
    fn server_time(&self) -> Result<String>;
}

/// A message published on the push bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    pub id: i64,
    pub channel: String,
    pub payload: serde_json::Value,
}

impl PushMessage {
    /// Order name carried by new-order notifications, if any
    pub fn order_name(&self) -> Option<&str> {
        self.payload.get("name").and_then(|v| v.as_str())
    }
}

pub trait PushSource: Send + Sync {
    /// Id of the newest message on `channel` (0 when empty)
    fn latest_message_id(&self, channel: &str) -> Result<i64>;

    /// Messages on `channel` with id greater than `after_id`, oldest first
    fn poll_messages(&self, channel: &str, after_id: i64) -> Result<Vec<PushMessage>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_push_message_order_name() {
        let msg = PushMessage {
            id: 1,
            channel: "kitchen_new_order".to_string(),
            payload: json!({"order_id": 4, "name": "Order 0004"}),
        };
        assert_eq!(msg.order_name(), Some("Order 0004"));

        let bare = PushMessage { payload: json!({}), ..msg };
        assert_eq!(bare.order_name(), None);
    }
}

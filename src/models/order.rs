use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::error::BoardError;
use crate::pipeline::StagePipeline;
use crate::utils::parse_wire_timestamp;

/// Product id -> category ids, resolved through the product template
pub type CategoryMap = HashMap<i64, BTreeSet<i64>>;

/// Order-level classification derived from the stages of its lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionState {
    #[default]
    New,
    InProgress,
    Ready,
    Done,
}

impl CompletionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionState::New => "new",
            CompletionState::InProgress => "in_progress",
            CompletionState::Ready => "ready",
            CompletionState::Done => "done",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "new" => Some(CompletionState::New),
            "in_progress" => Some(CompletionState::InProgress),
            "ready" => Some(CompletionState::Ready),
            "done" => Some(CompletionState::Done),
            _ => None,
        }
    }

    /// Derive the state from the stage of every line
    ///
    /// Done wins, then Ready, then InProgress. An order with no lines is
    /// vacuously Done; the display filter never lets such an order through.
    pub fn derive<I>(stage_ids: I, pipeline: &StagePipeline) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        let mut all_terminal = true;
        let mut all_ready_or_terminal = true;
        let mut any_ready = false;
        let mut any_advanced = false;

        for stage_id in stage_ids {
            let terminal = pipeline.is_terminal(stage_id);
            let ready = !terminal && pipeline.is_ready(stage_id);
            all_terminal &= terminal;
            all_ready_or_terminal &= terminal || ready;
            any_ready |= ready;
            any_advanced |= pipeline.index_of(stage_id).map_or(false, |idx| idx > 0);
        }

        if all_terminal {
            CompletionState::Done
        } else if all_ready_or_terminal && any_ready {
            CompletionState::Ready
        } else if any_advanced {
            CompletionState::InProgress
        } else {
            CompletionState::New
        }
    }
}

/// Order row as returned by the order-stream query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOrder {
    pub id: i64,
    pub name: String,
    pub pos_reference: Option<String>,
    pub source_id: Option<i64>,
    pub table: Option<String>,
    /// Wire representation, naive UTC or RFC 3339
    pub created_at: String,
    pub completion_state: Option<String>,
    pub line_ids: Vec<i64>,
}

/// Line row as returned by the line query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLine {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: f64,
    pub stage_id: Option<i64>,
    pub has_recipe: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: f64,
    pub category_ids: BTreeSet<i64>,
    pub current_stage_id: i64,
    /// False when the stage is only the visual default (nothing stored upstream)
    pub stage_assigned: bool,
    pub has_recipe: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub display_reference: String,
    pub source_id: Option<i64>,
    pub table: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Lines shown on the active display
    pub lines: Vec<OrderLine>,
    /// Lines the display filter set aside. They still count for the order
    /// state and are reset along with the visible ones.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hidden_lines: Vec<OrderLine>,
    /// Last stored (or optimistically written) state
    pub completion_state: CompletionState,
}

impl Order {
    /// Build a board order from the raw order and line rows.
    ///
    /// Lines without a stage get the pipeline's first stage; that default is
    /// never written back by itself. Line ids missing from `lines` become
    /// "Unknown" placeholders with zero quantity.
    pub fn expand(
        raw: &RawOrder,
        lines: &HashMap<i64, RawLine>,
        categories: &CategoryMap,
        pipeline: &StagePipeline,
    ) -> Result<Self, BoardError> {
        let created_at = parse_wire_timestamp(&raw.created_at)?;
        let first_stage = pipeline.first().id;

        let lines = raw
            .line_ids
            .iter()
            .map(|line_id| match lines.get(line_id) {
                Some(line) => OrderLine {
                    id: line.id,
                    product_id: line.product_id,
                    product_name: line.product_name.clone(),
                    quantity: line.quantity,
                    category_ids: categories.get(&line.product_id).cloned().unwrap_or_default(),
                    current_stage_id: line.stage_id.unwrap_or(first_stage),
                    stage_assigned: line.stage_id.is_some(),
                    has_recipe: line.has_recipe,
                },
                None => OrderLine {
                    id: *line_id,
                    product_id: 0,
                    product_name: "Unknown".to_string(),
                    quantity: 0.0,
                    category_ids: BTreeSet::new(),
                    current_stage_id: first_stage,
                    stage_assigned: false,
                    has_recipe: false,
                },
            })
            .collect();

        Ok(Order {
            id: raw.id,
            display_reference: raw
                .pos_reference
                .clone()
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| raw.name.clone()),
            source_id: raw.source_id,
            table: raw.table.clone().filter(|t| !t.is_empty()),
            created_at,
            lines,
            hidden_lines: Vec::new(),
            completion_state: raw
                .completion_state
                .as_deref()
                .and_then(CompletionState::from_str)
                .unwrap_or_default(),
        })
    }

    pub fn line(&self, line_id: i64) -> Option<&OrderLine> {
        self.lines.iter().find(|l| l.id == line_id)
    }

    pub fn line_mut(&mut self, line_id: i64) -> Option<&mut OrderLine> {
        self.lines.iter_mut().find(|l| l.id == line_id)
    }

    /// Visible and hidden lines together
    pub fn all_lines(&self) -> impl Iterator<Item = &OrderLine> {
        self.lines.iter().chain(self.hidden_lines.iter())
    }

    pub fn all_lines_mut(&mut self) -> impl Iterator<Item = &mut OrderLine> {
        self.lines.iter_mut().chain(self.hidden_lines.iter_mut())
    }

    /// State over every line of the order, hidden ones included
    pub fn derived_state(&self, pipeline: &StagePipeline) -> CompletionState {
        CompletionState::derive(self.all_lines().map(|l| l.current_stage_id), pipeline)
    }
}

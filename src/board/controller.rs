//! Stage transitions for order lines.
//!
//! Every transition is applied to the in-memory order first and written to
//! the backing store in the background. A failed write is reported but the
//! local value stays; the next refetch brings the board back in line with
//! the store.

use crate::board::writes::{PendingWrites, StoreWrite, WriteDispatcher};
use crate::error::BoardError;
use crate::models::{CompletionState, Order};
use crate::pipeline::{StagePipeline, WrapPolicy};

/// Result of advancing one line
#[derive(Debug)]
pub struct Transition {
    pub order_id: i64,
    pub line_id: i64,
    pub from_stage: i64,
    pub to_stage: i64,
    /// The line cycled from the last stage back to the first
    pub wrapped: bool,
    pub previous_state: CompletionState,
    pub state: CompletionState,
    pub pending: PendingWrites,
}

#[derive(Debug)]
pub struct ResetOutcome {
    pub order_id: i64,
    pub lines_reset: usize,
    pub pending: PendingWrites,
}

#[derive(Clone)]
pub struct StageController {
    writes: WriteDispatcher,
}

impl StageController {
    pub fn new(writes: WriteDispatcher) -> Self {
        Self { writes }
    }

    /// Move one line to the next stage and re-derive the order state
    pub fn advance(
        &self,
        pipeline: &StagePipeline,
        order: &mut Order,
        line_id: i64,
    ) -> Result<Transition, BoardError> {
        let order_id = order.id;
        let line = order
            .line_mut(line_id)
            .ok_or(BoardError::UnknownLine { order_id, line_id })?;

        let from_stage = line.current_stage_id;
        let to_stage = pipeline.next(from_stage).id;
        let wrapped = pipeline.policy() == WrapPolicy::Wrap
            && from_stage == pipeline.last().id
            && to_stage == pipeline.first().id
            && pipeline.len() > 1;

        line.current_stage_id = to_stage;
        line.stage_assigned = true;

        let mut pending = PendingWrites::default();
        pending.push(self.writes.dispatch(StoreWrite::LineStage { line_id, stage_id: to_stage }));

        // Derived over hidden lines as well
        let previous_state = order.completion_state;
        let state = order.derived_state(pipeline);
        if state != previous_state {
            order.completion_state = state;
            pending.push(self.writes.dispatch(StoreWrite::OrderState { order_id, state }));
        }

        log::info!(
            "Order {} line {}: stage {} -> {} ({})",
            order_id,
            line_id,
            from_stage,
            to_stage,
            state.as_str()
        );

        Ok(Transition {
            order_id,
            line_id,
            from_stage,
            to_stage,
            wrapped,
            previous_state,
            state,
            pending,
        })
    }

    /// Put every line back on the first stage and the order back to New.
    ///
    /// Lines hidden by the display filter are reset too.
    pub fn reset(&self, pipeline: &StagePipeline, order: &mut Order) -> ResetOutcome {
        let first = pipeline.first().id;
        for line in order.all_lines_mut() {
            line.current_stage_id = first;
            line.stage_assigned = true;
        }
        order.completion_state = CompletionState::New;

        let line_ids: Vec<i64> = order.all_lines().map(|l| l.id).collect();
        let lines_reset = line_ids.len();
        let mut pending = PendingWrites::default();
        pending.push(self.writes.dispatch(StoreWrite::Reset {
            order_id: order.id,
            line_ids,
            stage_id: first,
        }));

        log::info!("Order {} reset to stage {}", order.id, first);

        ResetOutcome { order_id: order.id, lines_reset, pending }
    }
}

//! Stage pipeline: the ordered kitchen workflow.
//!
//! Pure lookup and sequencing over the stages loaded at session start. What
//! happens when a line is advanced past the last stage is decided by
//! [`WrapPolicy`]; deployments disagree on this, so it is configuration.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::BoardError;
use crate::models::Stage;
use crate::store::BackingStore;

/// Behaviour of `next` on the last stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WrapPolicy {
    /// Stay on the last stage
    #[default]
    Clamp,
    /// Cycle back to the first stage
    Wrap,
}

impl WrapPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            WrapPolicy::Clamp => "clamp",
            WrapPolicy::Wrap => "wrap",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "clamp" => Some(WrapPolicy::Clamp),
            "wrap" => Some(WrapPolicy::Wrap),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StagePipeline {
    stages: Vec<Stage>,
    policy: WrapPolicy,
}

impl StagePipeline {
    /// Build a pipeline, ordering stages by (sequence, id)
    pub fn new(mut stages: Vec<Stage>, policy: WrapPolicy) -> Result<Self, BoardError> {
        if stages.is_empty() {
            return Err(BoardError::EmptyPipeline);
        }
        stages.sort_by(|a, b| a.sequence.cmp(&b.sequence).then(a.id.cmp(&b.id)));
        Ok(Self { stages, policy })
    }

    /// Load the configured stages from the backing store
    pub fn load(store: &dyn BackingStore, policy: WrapPolicy) -> Result<Self> {
        let stages = store.load_stages()?;
        Ok(Self::new(stages, policy)?)
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn policy(&self) -> WrapPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn first(&self) -> &Stage {
        &self.stages[0]
    }

    pub fn last(&self) -> &Stage {
        &self.stages[self.stages.len() - 1]
    }

    pub fn index_of(&self, stage_id: i64) -> Option<usize> {
        self.stages.iter().position(|s| s.id == stage_id)
    }

    pub fn get(&self, stage_id: i64) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id == stage_id)
    }

    pub fn is_terminal(&self, stage_id: i64) -> bool {
        self.get(stage_id).map_or(false, |s| s.is_terminal)
    }

    pub fn is_ready(&self, stage_id: i64) -> bool {
        self.get(stage_id).map_or(false, |s| s.is_ready)
    }

    /// Stage after `current` under the wrap policy.
    ///
    /// An id that is not part of the pipeline sits "before" the first stage,
    /// so advancing it lands on the first stage.
    pub fn next(&self, current: i64) -> &Stage {
        match self.index_of(current) {
            None => self.first(),
            Some(idx) if idx + 1 < self.stages.len() => &self.stages[idx + 1],
            Some(idx) => match self.policy {
                WrapPolicy::Clamp => &self.stages[idx],
                WrapPolicy::Wrap => self.first(),
            },
        }
    }
}

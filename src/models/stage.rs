use serde::{Deserialize, Serialize};

/// A named step of the kitchen workflow
///
/// Stages are configured upstream and loaded once per session. `sequence`
/// (ties broken by `id`) orders the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub id: i64,
    pub name: String,
    pub sequence: i64,
    /// Lines on this stage are fully prepared
    pub is_terminal: bool,
    /// Lines on this stage count toward the order-level Ready state
    pub is_ready: bool,
    /// Render the stage collapsed (name only)
    pub fold: bool,
}

impl Stage {
    pub fn new(id: i64, name: &str, sequence: i64) -> Self {
        Self {
            id,
            name: name.to_string(),
            sequence,
            is_terminal: false,
            is_ready: false,
            fold: false,
        }
    }

    pub fn terminal(mut self) -> Self {
        self.is_terminal = true;
        self
    }

    pub fn ready(mut self) -> Self {
        self.is_ready = true;
        self
    }
}

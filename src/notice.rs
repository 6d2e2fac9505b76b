// Transient operator notifications

use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Danger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// Reading config, stages, displays or orders failed
    Fetch,
    /// A stage or order-state write failed; the local value was kept
    Write,
    /// The operator asked for something that cannot be done
    Operation,
    /// Push notification of a new or changed order
    NewOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn fetch_failed(what: &str) -> Self {
        Self {
            level: NoticeLevel::Danger,
            kind: NoticeKind::Fetch,
            message: format!("Failed to load {}", what),
        }
    }

    pub fn write_failed(what: &str) -> Self {
        Self {
            level: NoticeLevel::Danger,
            kind: NoticeKind::Write,
            message: format!("Failed to save {}", what),
        }
    }

    pub fn refused(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            kind: NoticeKind::Operation,
            message: message.into(),
        }
    }

    /// Acknowledgement of an operator setting change
    pub fn status(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            kind: NoticeKind::Operation,
            message: message.into(),
        }
    }

    pub fn new_order(name: Option<&str>) -> Self {
        Self {
            level: NoticeLevel::Success,
            kind: NoticeKind::NewOrder,
            message: format!("New Order: {}", name.unwrap_or_default()),
        }
    }
}

/// Cloneable sender side of the notice stream.
///
/// Sending never fails from the caller's point of view; a notice with no
/// listener is dropped.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: UnboundedSender<Notice>,
}

impl Notifier {
    pub fn channel() -> (Self, UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn notify(&self, notice: Notice) {
        if self.tx.send(notice).is_err() {
            log::debug!("Notice dropped, no listener");
        }
    }
}

// Fire-and-forget writes to the backing store.
//
// Writes go through one queue and run on the blocking pool one at a time,
// in dispatch order. Failures are logged and turned into a Write notice; the
// optimistic local value is never rolled back.

use anyhow::Result;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

use crate::models::CompletionState;
use crate::notice::{Notice, Notifier};
use crate::store::BackingStore;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreWrite {
    LineStage { line_id: i64, stage_id: i64 },
    OrderState { order_id: i64, state: CompletionState },
    Reset { order_id: i64, line_ids: Vec<i64>, stage_id: i64 },
}

impl StoreWrite {
    fn apply(&self, store: &dyn BackingStore) -> Result<()> {
        match self {
            StoreWrite::LineStage { line_id, stage_id } => store.write_line_stage(*line_id, *stage_id),
            StoreWrite::OrderState { order_id, state } => store.write_order_state(*order_id, *state),
            StoreWrite::Reset { order_id, line_ids, stage_id } => {
                store.write_reset(*order_id, line_ids, *stage_id, CompletionState::New)
            }
        }
    }
}

impl fmt::Display for StoreWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreWrite::LineStage { line_id, .. } => write!(f, "stage of line {}", line_id),
            StoreWrite::OrderState { order_id, .. } => write!(f, "state of order {}", order_id),
            StoreWrite::Reset { order_id, .. } => write!(f, "reset of order {}", order_id),
        }
    }
}

struct QueuedWrite {
    write: StoreWrite,
    done: oneshot::Sender<bool>,
}

#[derive(Clone)]
pub struct WriteDispatcher {
    store: Arc<dyn BackingStore>,
    notifier: Notifier,
    queue: Arc<Mutex<Option<UnboundedSender<QueuedWrite>>>>,
}

impl WriteDispatcher {
    pub fn new(store: Arc<dyn BackingStore>, notifier: Notifier) -> Self {
        Self { store, notifier, queue: Arc::new(Mutex::new(None)) }
    }

    /// Queue the write. Must be called inside a tokio runtime; the queue
    /// worker is started on first use and restarted if its runtime is gone.
    /// The receiver resolves to whether the write succeeded.
    pub fn dispatch(&self, write: StoreWrite) -> oneshot::Receiver<bool> {
        let (done, outcome) = oneshot::channel();
        let mut queued = QueuedWrite { write, done };

        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = queue.as_ref() {
            match tx.send(queued) {
                Ok(()) => return outcome,
                Err(mpsc::error::SendError(returned)) => queued = returned,
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(drain_queue(Arc::clone(&self.store), self.notifier.clone(), rx));
        // The worker holds the receiver, so this only fails if it already died
        if tx.send(queued).is_err() {
            log::error!("Write queue closed before the write was queued");
        }
        *queue = Some(tx);
        outcome
    }
}

async fn drain_queue(
    store: Arc<dyn BackingStore>,
    notifier: Notifier,
    mut rx: UnboundedReceiver<QueuedWrite>,
) {
    while let Some(QueuedWrite { write, done }) = rx.recv().await {
        let task_store = Arc::clone(&store);
        let task_write = write.clone();
        let applied = tokio::task::spawn_blocking(move || task_write.apply(task_store.as_ref())).await;

        let saved = match applied {
            Ok(Ok(())) => {
                log::debug!("Saved {}", write);
                true
            }
            Ok(Err(e)) => {
                log::error!("Failed to save {}: {:#}", write, e);
                notifier.notify(Notice::write_failed(&write.to_string()));
                false
            }
            Err(e) => {
                log::error!("Write task for {} did not complete: {}", write, e);
                notifier.notify(Notice::write_failed(&write.to_string()));
                false
            }
        };
        // The caller may not be waiting
        let _ = done.send(saved);
    }
}

/// Outcome of a batch of dispatched writes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub saved: usize,
    pub failed: usize,
}

/// Outcomes of the writes queued by one operation
#[derive(Default)]
pub struct PendingWrites(Vec<oneshot::Receiver<bool>>);

impl PendingWrites {
    pub fn push(&mut self, outcome: oneshot::Receiver<bool>) {
        self.0.push(outcome);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Wait for every write to finish
    pub async fn settle(self) -> WriteSummary {
        let mut summary = WriteSummary::default();
        for outcome in self.0 {
            match outcome.await {
                Ok(true) => summary.saved += 1,
                Ok(false) => summary.failed += 1,
                Err(_) => {
                    log::error!("Write dropped before it finished");
                    summary.failed += 1;
                }
            }
        }
        summary
    }
}

impl fmt::Debug for PendingWrites {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PendingWrites({})", self.0.len())
    }
}

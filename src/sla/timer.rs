// One ticking timer per visible order card

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::clock::ClockOffset;
use crate::sla::{read, SlaReading, SlaThresholds};

const TICK: Duration = Duration::from_secs(1);

/// Everything a card needs to classify itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardClock {
    pub order_id: i64,
    pub created_at: DateTime<Utc>,
    pub offset: ClockOffset,
    pub thresholds: SlaThresholds,
}

impl CardClock {
    pub fn reading(&self, client_now: DateTime<Utc>) -> SlaReading {
        read(self.created_at, client_now, self.offset, &self.thresholds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaTick {
    pub order_id: i64,
    pub reading: SlaReading,
}

/// Owner of the per-card timer tasks.
///
/// Dropping it cancels every timer.
pub struct CardTimers {
    tx: UnboundedSender<SlaTick>,
    timers: HashMap<i64, (CardClock, JoinHandle<()>)>,
}

impl CardTimers {
    pub fn new(tx: UnboundedSender<SlaTick>) -> Self {
        Self { tx, timers: HashMap::new() }
    }

    /// Start ticking for a card. Remounting with a different clock restarts it.
    pub fn mount(&mut self, clock: CardClock) {
        if let Some((existing, _)) = self.timers.get(&clock.order_id) {
            if *existing == clock {
                return;
            }
            self.unmount(clock.order_id);
        }

        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                // First tick fires immediately
                interval.tick().await;
                let tick = SlaTick { order_id: clock.order_id, reading: clock.reading(Utc::now()) };
                if tx.send(tick).is_err() {
                    break;
                }
            }
        });
        self.timers.insert(clock.order_id, (clock, handle));
    }

    pub fn unmount(&mut self, order_id: i64) {
        if let Some((_, handle)) = self.timers.remove(&order_id) {
            handle.abort();
        }
    }

    /// Mount `clocks` and unmount every card not among them
    pub fn sync<I>(&mut self, clocks: I)
    where
        I: IntoIterator<Item = CardClock>,
    {
        let clocks: Vec<CardClock> = clocks.into_iter().collect();
        let stale: Vec<i64> = self
            .timers
            .keys()
            .filter(|id| !clocks.iter().any(|c| c.order_id == **id))
            .copied()
            .collect();
        for order_id in stale {
            self.unmount(order_id);
        }
        for clock in clocks {
            self.mount(clock);
        }
    }

    pub fn is_mounted(&self, order_id: i64) -> bool {
        self.timers.contains_key(&order_id)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

impl Drop for CardTimers {
    fn drop(&mut self) {
        for (_, handle) in self.timers.values() {
            handle.abort();
        }
    }
}

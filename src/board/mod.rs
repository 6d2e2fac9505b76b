//! The board: the filtered, expanded order set shown on one display.
//!
//! A refresh always replaces the whole set (no incremental merge). Orders the
//! operator cleared stay hidden for the rest of the session.

pub mod controller;
pub mod writes;

pub use controller::{ResetOutcome, StageController, Transition};
pub use writes::{PendingWrites, StoreWrite, WriteDispatcher, WriteSummary};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::clock::ClockOffset;
use crate::config::{DisplayProfile, Settings};
use crate::error::BoardError;
use crate::filter::{filter_orders, tally_products, ProductFocus, ProductTally};
use crate::models::{CompletionState, Display, Order, RawLine};
use crate::notice::{Notice, Notifier};
use crate::pipeline::StagePipeline;
use crate::sla::{self, CardClock, SlaReading};
use crate::store::{BackingStore, OrderQuery};

/// Order-stream query settings taken from the global configuration
#[derive(Debug, Clone, PartialEq)]
pub struct FetchSettings {
    pub limit: usize,
    pub window_hours: Option<i64>,
    pub states: Vec<String>,
}

impl From<&Settings> for FetchSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            limit: settings.fetch_limit,
            window_hours: settings.fetch_window_hours,
            states: settings.fetch_states.clone(),
        }
    }
}

/// Fetch, expand and filter the orders for one display
pub fn fetch_board_orders(
    store: &dyn BackingStore,
    pipeline: &StagePipeline,
    display: &Display,
    query: &OrderQuery,
) -> Result<Vec<Order>> {
    let raw_orders = store.fetch_orders(query).context("Failed to fetch order stream")?;

    let line_ids: Vec<i64> = raw_orders.iter().flat_map(|o| o.line_ids.iter().copied()).collect();
    let lines: HashMap<i64, RawLine> = store
        .fetch_lines(&line_ids)
        .context("Failed to fetch order lines")?
        .into_iter()
        .map(|line| (line.id, line))
        .collect();

    let mut product_ids: Vec<i64> = lines.values().map(|l| l.product_id).collect();
    product_ids.sort_unstable();
    product_ids.dedup();
    let categories = store
        .resolve_categories(&product_ids)
        .context("Failed to resolve product categories")?;

    let orders = raw_orders
        .iter()
        .filter_map(|raw| match Order::expand(raw, &lines, &categories, pipeline) {
            Ok(order) => Some(order),
            Err(e) => {
                log::warn!("Skipping order {} ({}): {}", raw.id, raw.name, e);
                None
            }
        })
        .collect();

    Ok(filter_orders(orders, display))
}

/// A self-contained fetch that can run on the blocking pool
pub struct FetchJob {
    store: Arc<dyn BackingStore>,
    pipeline: StagePipeline,
    display: Display,
    query: OrderQuery,
}

impl FetchJob {
    pub fn display_id(&self) -> i64 {
        self.display.id
    }

    pub fn run(&self) -> Result<Vec<Order>> {
        fetch_board_orders(self.store.as_ref(), &self.pipeline, &self.display, &self.query)
    }
}

pub struct Board {
    store: Arc<dyn BackingStore>,
    controller: StageController,
    notifier: Notifier,
    pipeline: StagePipeline,
    profile: DisplayProfile,
    clock: ClockOffset,
    fetch: FetchSettings,
    orders: Vec<Order>,
    cleared: HashSet<i64>,
    focus: ProductFocus,
}

impl Board {
    pub fn new(
        store: Arc<dyn BackingStore>,
        notifier: Notifier,
        pipeline: StagePipeline,
        profile: DisplayProfile,
        clock: ClockOffset,
        fetch: FetchSettings,
    ) -> Self {
        let controller = StageController::new(WriteDispatcher::new(Arc::clone(&store), notifier.clone()));
        Self {
            store,
            controller,
            notifier,
            pipeline,
            profile,
            clock,
            fetch,
            orders: Vec::new(),
            cleared: HashSet::new(),
            focus: ProductFocus::default(),
        }
    }

    pub fn pipeline(&self) -> &StagePipeline {
        &self.pipeline
    }

    pub fn profile(&self) -> &DisplayProfile {
        &self.profile
    }

    pub fn display_id(&self) -> i64 {
        self.profile.display.id
    }

    pub fn clock(&self) -> ClockOffset {
        self.clock
    }

    /// Every order on the board, newest first
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    /// Orders after the product focus is applied
    pub fn visible(&self) -> Vec<&Order> {
        self.orders.iter().filter(|o| self.focus.matches(o)).collect()
    }

    pub fn order(&self, order_id: i64) -> Option<&Order> {
        self.orders.iter().find(|o| o.id == order_id)
    }

    pub fn query(&self, now: DateTime<Utc>) -> OrderQuery {
        OrderQuery {
            source_ids: self.profile.display.allowed_source_ids.clone(),
            since: self.fetch.window_hours.map(|hours| now - Duration::hours(hours)),
            limit: self.fetch.limit,
            states: self.fetch.states.clone(),
        }
    }

    pub fn fetch_job(&self) -> FetchJob {
        FetchJob {
            store: Arc::clone(&self.store),
            pipeline: self.pipeline.clone(),
            display: self.profile.display.clone(),
            query: self.query(Utc::now()),
        }
    }

    /// Fetch and apply in one blocking call
    pub fn refresh(&mut self) -> bool {
        let job = self.fetch_job();
        let result = job.run();
        self.apply_refresh(job.display_id(), result)
    }

    /// Replace the order set with a fetch result.
    ///
    /// Results for another display are discarded. On failure the previous
    /// orders are kept and the operator is notified.
    pub fn apply_refresh(&mut self, display_id: i64, result: Result<Vec<Order>>) -> bool {
        if display_id != self.display_id() {
            log::debug!("Discarding refresh for display {} (active: {})", display_id, self.display_id());
            return false;
        }
        match result {
            Ok(orders) => {
                let cleared = &self.cleared;
                self.orders = orders.into_iter().filter(|o| !cleared.contains(&o.id)).collect();
                log::debug!("Board refreshed: {} orders", self.orders.len());
                true
            }
            Err(e) => {
                log::error!("Refresh failed: {:#}", e);
                self.notifier.notify(Notice::fetch_failed("orders"));
                false
            }
        }
    }

    /// Switch to another display; the caller refreshes afterwards
    pub fn switch_profile(&mut self, profile: DisplayProfile) {
        log::info!("Switching to display {} ({})", profile.display.id, profile.display.name);
        self.profile = profile;
        self.orders.clear();
        self.focus.clear();
    }

    pub fn advance(&mut self, order_id: i64, line_id: i64) -> Result<Transition, BoardError> {
        let order = self
            .orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or(BoardError::UnknownOrder(order_id))?;
        self.controller.advance(&self.pipeline, order, line_id)
    }

    pub fn reset(&mut self, order_id: i64) -> Result<ResetOutcome, BoardError> {
        let order = self
            .orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or(BoardError::UnknownOrder(order_id))?;
        Ok(self.controller.reset(&self.pipeline, order))
    }

    /// Hide a finished order for the rest of the session. Nothing is written.
    pub fn clear(&mut self, order_id: i64) -> Result<(), BoardError> {
        let idx = self
            .orders
            .iter()
            .position(|o| o.id == order_id)
            .ok_or(BoardError::UnknownOrder(order_id))?;

        if self.orders[idx].derived_state(&self.pipeline) != CompletionState::Done {
            let err = BoardError::NotDone(order_id);
            self.notifier.notify(Notice::refused(err.to_string()));
            return Err(err);
        }

        self.orders.remove(idx);
        self.cleared.insert(order_id);
        log::info!("Order {} cleared from display {}", order_id, self.display_id());
        Ok(())
    }

    pub fn is_cleared(&self, order_id: i64) -> bool {
        self.cleared.contains(&order_id)
    }

    pub fn focus(&self) -> ProductFocus {
        self.focus
    }

    pub fn toggle_focus(&mut self, product_id: i64) {
        self.focus.toggle(product_id);
    }

    /// Product totals over every order on the board (focus ignored)
    pub fn tally(&self) -> Vec<ProductTally> {
        tally_products(&self.orders)
    }

    pub fn card_clock(&self, order: &Order) -> CardClock {
        CardClock {
            order_id: order.id,
            created_at: order.created_at,
            offset: self.clock,
            thresholds: self.profile.sla,
        }
    }

    /// Clocks for the cards currently visible
    pub fn card_clocks(&self) -> Vec<CardClock> {
        self.visible().into_iter().map(|o| self.card_clock(o)).collect()
    }

    pub fn reading(&self, order: &Order, client_now: DateTime<Utc>) -> SlaReading {
        sla::read(order.created_at, client_now, self.clock, &self.profile.sla)
    }
}

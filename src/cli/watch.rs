// Live board loop.
//
// Everything runs on one current-thread runtime: card timers, the push
// listener and background fetches feed channels that a single select loop
// drains. Store calls go to the blocking pool.

use crate::board::{Board, FetchSettings};
use crate::cli::output::{clear_screen, format_board, format_notice, format_watch_help, BoardRenderOptions, BELL};
use crate::clock::ClockOffset;
use crate::config::{DisplayProfile, Settings};
use crate::error::BoardError;
use crate::live::{BoardCommand, LiveListener, PushAlert, SoundMute};
use crate::models::Order;
use crate::notice::{Notice, Notifier};
use crate::pipeline::StagePipeline;
use crate::session::DisplaySession;
use crate::sla::{CardTimers, SlaReading};
use crate::store::SqliteStore;
use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};

/// Notices kept under the board
const NOTICE_HISTORY: usize = 3;

type RefreshResult = (i64, Result<Vec<Order>>);

fn spawn_refresh(board: &Board, tx: &UnboundedSender<RefreshResult>) {
    let job = board.fetch_job();
    let tx = tx.clone();
    tokio::task::spawn_blocking(move || {
        let result = job.run();
        // The loop may already be gone
        let _ = tx.send((job.display_id(), result));
    });
}

/// Forward stdin lines from a plain thread; it is left behind on exit
fn spawn_stdin_reader(tx: UnboundedSender<String>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::warn!("Reading stdin failed: {}", e);
                    break;
                }
            }
        }
    });
}

struct WatchState {
    board: Board,
    session: DisplaySession,
    notifier: Notifier,
    timers: CardTimers,
    readings: HashMap<i64, SlaReading>,
    mute: SoundMute,
    refresh_tx: UnboundedSender<RefreshResult>,
}

impl WatchState {
    fn remount_timers(&mut self) {
        self.timers.sync(self.board.card_clocks());
        let board = &self.board;
        self.readings.retain(|order_id, _| board.order(*order_id).is_some());
    }

    fn refused(&self, err: &BoardError) {
        self.notifier.notify(Notice::refused(err.to_string()));
    }

    /// Apply one operator command; false means quit
    fn handle(&mut self, command: BoardCommand) -> bool {
        match command {
            BoardCommand::Advance { order_id, line_id } => {
                // Writes finish in the background; failures arrive as notices
                if let Err(e) = self.board.advance(order_id, line_id) {
                    self.refused(&e);
                }
            }
            BoardCommand::Reset { order_id } => {
                if let Err(e) = self.board.reset(order_id) {
                    self.refused(&e);
                }
            }
            BoardCommand::Clear { order_id } => match self.board.clear(order_id) {
                Ok(()) => self.remount_timers(),
                // Already reported by the board
                Err(BoardError::NotDone(_)) => {}
                Err(e) => self.refused(&e),
            },
            BoardCommand::Focus { product_id } => {
                self.board.toggle_focus(product_id);
                self.remount_timers();
            }
            BoardCommand::SwitchDisplay { display_id } => match self.session.select(display_id) {
                Ok(profile) => {
                    self.board.switch_profile(profile);
                    self.remount_timers();
                    spawn_refresh(&self.board, &self.refresh_tx);
                }
                Err(e) => {
                    log::warn!("Display switch refused: {:#}", e);
                    self.notifier.notify(Notice::refused(format!("{:#}", e)));
                }
            },
            BoardCommand::ToggleMute => {
                let message = if self.mute.toggle() { "Sound muted" } else { "Sound on" };
                self.notifier.notify(Notice::status(message));
            }
            BoardCommand::Refresh => spawn_refresh(&self.board, &self.refresh_tx),
            BoardCommand::Quit => return false,
        }
        true
    }
}

pub async fn run_watch(
    settings: Settings,
    store: Arc<SqliteStore>,
    session: DisplaySession,
    profile: DisplayProfile,
) -> Result<()> {
    let pipeline = StagePipeline::load(store.as_ref(), settings.wrap_policy)
        .context("Failed to load stages")?;
    let time_source = Arc::clone(&store);
    let clock = tokio::task::spawn_blocking(move || ClockOffset::sync(time_source.as_ref(), Utc::now()))
        .await
        .context("Clock sync did not complete")?;
    log::debug!("Clock offset: {} ms", clock.millis());

    let (notifier, mut notices) = Notifier::channel();
    let board = Board::new(
        store.clone(),
        notifier.clone(),
        pipeline,
        profile,
        clock,
        FetchSettings::from(&settings),
    );

    let (refresh_tx, mut refreshed) = mpsc::unbounded_channel::<RefreshResult>();
    let (tick_tx, mut ticks) = mpsc::unbounded_channel();
    let (push_tx, mut pushes) = mpsc::unbounded_channel();
    let (line_tx, mut lines) = mpsc::unbounded_channel::<String>();

    let listener = LiveListener::start(
        store.clone(),
        &settings.bus_channel,
        Duration::from_millis(settings.bus_poll_ms),
        push_tx,
        &notifier,
    );
    spawn_stdin_reader(line_tx);

    let mut state = WatchState {
        board,
        session,
        notifier,
        timers: CardTimers::new(tick_tx),
        readings: HashMap::new(),
        mute: SoundMute::default(),
        refresh_tx,
    };
    spawn_refresh(&state.board, &state.refresh_tx);

    let opts = BoardRenderOptions::default();
    let mut recent: VecDeque<Notice> = VecDeque::with_capacity(NOTICE_HISTORY);
    let mut redraw = tokio::time::interval(Duration::from_secs(1));
    let mut dirty = true;
    let mut stdin_open = true;

    loop {
        tokio::select! {
            Some((display_id, result)) = refreshed.recv() => {
                if state.board.apply_refresh(display_id, result) {
                    state.remount_timers();
                    dirty = true;
                }
            }
            Some(tick) = ticks.recv() => {
                state.readings.insert(tick.order_id, tick.reading);
                dirty = true;
            }
            Some(message) = pushes.recv() => {
                let sound = state.mute.allows(state.board.profile().sound_enabled);
                let alert = PushAlert::for_message(&message, sound);
                if alert.ring_bell {
                    print!("{}", BELL);
                }
                state.notifier.notify(alert.notice);
                spawn_refresh(&state.board, &state.refresh_tx);
            }
            Some(notice) = notices.recv() => {
                if recent.len() == NOTICE_HISTORY {
                    recent.pop_front();
                }
                recent.push_back(notice);
                dirty = true;
            }
            line = lines.recv(), if stdin_open => match line {
                Some(line) => {
                    match BoardCommand::parse(&line) {
                        Ok(Some(command)) => {
                            if !state.handle(command) {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => state.notifier.notify(Notice::refused(e)),
                    }
                    dirty = true;
                }
                None => stdin_open = false,
            },
            _ = redraw.tick() => {
                if dirty {
                    render(&state, &recent, &opts)?;
                    dirty = false;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    if let Some(listener) = listener {
        listener.abort();
    }
    Ok(())
}

fn render(state: &WatchState, recent: &VecDeque<Notice>, opts: &BoardRenderOptions) -> Result<()> {
    let mut out = String::from(clear_screen(opts.use_color));
    out.push_str(&format_board(&state.board, &state.readings, Utc::now(), opts));
    for notice in recent {
        out.push_str(&format_notice(notice, opts.use_color));
        out.push('\n');
    }
    out.push_str(&format_watch_help(opts.use_color));

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(out.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

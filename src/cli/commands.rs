use clap::{Parser, Subcommand};
use crate::board::{Board, FetchSettings};
use crate::cli::abbrev;
use crate::cli::error::{user_error, validate_id, validate_non_empty, parse_id_list, parse_line_spec};
use crate::cli::output::{
    format_board, format_board_json, format_displays, format_stages, format_tally, BoardRenderOptions,
};
use crate::cli::watch::run_watch;
use crate::clock::ClockOffset;
use crate::config::{DisplayProfile, Settings};
use crate::error::BoardError;
use crate::notice::Notifier;
use crate::pipeline::StagePipeline;
use crate::repo::{BusRepo, CatalogEntry, CatalogRepo, DisplayRepo, NewOrder, OrderRepo, StageRepo};
use crate::session::{DisplaySession, FileIdentityStore};
use crate::store::SqliteStore;
use crate::utils::{format_wire_timestamp, parse_wire_timestamp};
use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "kboard")]
#[command(about = "Kitchen production board - live order stages, SLA escalation and per-display filtering")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List displays (the active one is marked with *)
    Displays {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Make this client a display (by ID or name)
    Select {
        target: String,
    },
    /// Forget the selected display
    Forget,
    /// Show the orders on the active display
    Board {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
        /// Only show orders containing this product
        #[arg(long)]
        product: Option<i64>,
    },
    /// Product quantities across the board
    Tally {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Move an order line to its next stage
    Advance {
        /// Order ID
        order: String,
        /// Line ID
        line: String,
    },
    /// Put every line of an order back on the first stage
    Reset {
        /// Order ID
        order: String,
    },
    /// Live board: ticking SLA clocks, push updates and operator commands
    Watch,
    /// Show the stage pipeline
    Stages,
    /// Master data and order entry (stands in for the upstream system)
    Admin {
        #[command(subcommand)]
        subcommand: AdminCommands,
    },
}

#[derive(Subcommand)]
pub enum AdminCommands {
    /// Add a stage to the pipeline
    Stage {
        name: String,
        /// Position in the pipeline (ascending)
        #[arg(long)]
        sequence: i64,
        /// Lines on this stage are finished
        #[arg(long)]
        done: bool,
        /// Lines on this stage count toward Ready
        #[arg(long)]
        ready: bool,
        /// Render the stage folded
        #[arg(long)]
        fold: bool,
    },
    /// Add an order source, or list sources when no name is given
    Source {
        name: Option<String>,
    },
    /// Add a product category, or list categories when no name is given
    Category {
        name: Option<String>,
    },
    /// Add a product, or list products when no name is given
    Product {
        name: Option<String>,
        /// Category IDs (comma-separated)
        #[arg(long, default_value = "")]
        categories: String,
        /// The product has a recipe
        #[arg(long)]
        recipe: bool,
    },
    /// Create a display
    Display {
        name: String,
        /// Allowed source IDs (comma-separated, empty = all)
        #[arg(long, default_value = "")]
        sources: String,
        /// Allowed category IDs (comma-separated, empty = all)
        #[arg(long, default_value = "")]
        categories: String,
        /// SLA warning threshold in minutes
        #[arg(long)]
        warning: Option<i64>,
        /// SLA critical threshold in minutes
        #[arg(long)]
        critical: Option<i64>,
        /// Ring the bell on new orders (true/false)
        #[arg(long)]
        sound: Option<bool>,
    },
    /// Delete a display
    RemoveDisplay {
        id: String,
    },
    /// Enter an order and announce it on the push bus
    Order {
        /// Order name (e.g. "Order 0042")
        name: String,
        /// POS reference shown instead of the name
        #[arg(long)]
        reference: Option<String>,
        #[arg(long)]
        source: Option<i64>,
        #[arg(long)]
        table: Option<String>,
        /// Order line as <product>[:<qty>]; repeat for more lines
        #[arg(long = "line")]
        lines: Vec<String>,
        /// Upstream order state
        #[arg(long, default_value = "paid")]
        state: String,
        /// Order time (UTC, defaults to now)
        #[arg(long)]
        at: Option<String>,
    },
    /// Change the upstream state of an order and announce it
    OrderState {
        order: String,
        state: String,
    },
}

pub fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let args = match abbrev::expand_command_abbreviations(args) {
        Ok(expanded) => expanded,
        Err(e) => user_error(&e),
    };

    let clap_args = std::iter::once("kboard".to_string())
        .chain(args.iter().cloned())
        .collect::<Vec<_>>();
    let cli = match Cli::try_parse_from(clap_args) {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version are "errors" that print and exit cleanly
            if e.use_stderr() {
                e.print()?;
                std::process::exit(1);
            }
            e.print()?;
            return Ok(());
        }
    };

    handle_command(cli)
}

fn handle_command(cli: Cli) -> Result<()> {
    let settings = Settings::load()?;
    let store = Arc::new(SqliteStore::open(&settings)
        .context("Failed to connect to database")?);

    match cli.command {
        Commands::Displays { json } => handle_displays(&settings, store, json),
        Commands::Select { target } => handle_select(&settings, store, &target),
        Commands::Forget => {
            session(&settings, store).forget()?;
            println!("Display selection cleared.");
            Ok(())
        }
        Commands::Board { json, product } => handle_board(&settings, store, json, product),
        Commands::Tally { json } => handle_tally(&settings, store, json),
        Commands::Advance { order, line } => handle_advance(&settings, store, &order, &line),
        Commands::Reset { order } => handle_reset(&settings, store, &order),
        Commands::Watch => {
            let profile = require_display(&settings, store.clone())?;
            let session = session(&settings, store.clone());
            block_on(run_watch(settings.clone(), store, session, profile))?
        }
        Commands::Stages => {
            let pipeline = StagePipeline::load(store.as_ref(), settings.wrap_policy)
                .context("Failed to load stages")?;
            print!("{}", format_stages(&pipeline));
            Ok(())
        }
        Commands::Admin { subcommand } => handle_admin(&settings, &store, subcommand),
    }
}

fn session(settings: &Settings, store: Arc<SqliteStore>) -> DisplaySession {
    DisplaySession::new(store, Box::new(FileIdentityStore::default()), settings.clone())
}

/// Run a future on a fresh current-thread runtime
fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    Ok(runtime.block_on(future))
}

/// Profile of the remembered display; lists displays and exits when none
fn require_display(settings: &Settings, store: Arc<SqliteStore>) -> Result<DisplayProfile> {
    let session = session(settings, store);
    match session.restore()? {
        Some(profile) => Ok(profile),
        None => {
            let displays = session.list_displays()?;
            eprint!("{}", format_displays(&displays, None));
            user_error(&BoardError::NoActiveDisplay.to_string());
        }
    }
}

/// Board for the active display, filled with one synchronous fetch
fn load_board(settings: &Settings, store: Arc<SqliteStore>, profile: DisplayProfile) -> Result<Board> {
    let pipeline = StagePipeline::load(store.as_ref(), settings.wrap_policy)
        .context("Failed to load stages")?;
    let clock = ClockOffset::sync(store.as_ref(), Utc::now());
    // One-shot commands report failures through their own Result
    let (notifier, _notices) = Notifier::channel();
    let mut board = Board::new(store, notifier, pipeline, profile, clock, FetchSettings::from(settings));

    let job = board.fetch_job();
    let orders = job.run()?;
    board.apply_refresh(job.display_id(), Ok(orders));
    Ok(board)
}

fn handle_displays(settings: &Settings, store: Arc<SqliteStore>, json: bool) -> Result<()> {
    let session = session(settings, store);
    let displays = session.list_displays()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&displays)?);
    } else {
        let active = session.restore()?.map(|p| p.display.id);
        print!("{}", format_displays(&displays, active));
    }
    Ok(())
}

fn handle_select(settings: &Settings, store: Arc<SqliteStore>, target: &str) -> Result<()> {
    let session = session(settings, store);
    let Some(display) = session.lookup(target)? else {
        let suggestions = session.suggest(target)?;
        if suggestions.is_empty() {
            user_error(&format!("Display '{}' not found. Run 'kboard displays' to list them.", target));
        }
        let names: Vec<String> = suggestions
            .iter()
            .map(|(id, name)| format!("{} ({})", name, id))
            .collect();
        user_error(&format!("Display '{}' not found. Did you mean: {}?", target, names.join(", ")));
    };

    let profile = session.select(display.id)?;
    println!(
        "Selected display {} ({}). SLA {}/{} min, sound {}.",
        profile.display.id,
        profile.display.name,
        profile.sla.warning_minutes,
        profile.sla.critical_minutes,
        if profile.sound_enabled { "on" } else { "off" }
    );
    Ok(())
}

fn handle_board(settings: &Settings, store: Arc<SqliteStore>, json: bool, product: Option<i64>) -> Result<()> {
    let profile = require_display(settings, store.clone())?;
    let mut board = load_board(settings, store, profile)?;
    if let Some(product_id) = product {
        board.toggle_focus(product_id);
    }

    let now = Utc::now();
    if json {
        println!("{}", format_board_json(&board, now)?);
    } else {
        print!("{}", format_board(&board, &HashMap::new(), now, &BoardRenderOptions::default()));
    }
    Ok(())
}

fn handle_tally(settings: &Settings, store: Arc<SqliteStore>, json: bool) -> Result<()> {
    let profile = require_display(settings, store.clone())?;
    let board = load_board(settings, store, profile)?;
    let tally = board.tally();
    if json {
        println!("{}", serde_json::to_string_pretty(&tally)?);
    } else {
        print!("{}", format_tally(&tally));
    }
    Ok(())
}

fn parse_id_or_exit(value: &str, what: &str) -> i64 {
    match validate_id(value, what) {
        Ok(id) => id,
        Err(e) => user_error(&e),
    }
}

fn handle_advance(settings: &Settings, store: Arc<SqliteStore>, order: &str, line: &str) -> Result<()> {
    let order_id = parse_id_or_exit(order, "order");
    let line_id = parse_id_or_exit(line, "line");
    let profile = require_display(settings, store.clone())?;
    let mut board = load_board(settings, store, profile)?;

    block_on(async move {
        let transition = match board.advance(order_id, line_id) {
            Ok(t) => t,
            Err(e) => user_error(&e.to_string()),
        };
        let stage_name = |id: i64| {
            board.pipeline().get(id).map(|s| s.name.clone()).unwrap_or_else(|| id.to_string())
        };
        println!(
            "Order {} line {}: {} -> {}{} (order {})",
            transition.order_id,
            transition.line_id,
            stage_name(transition.from_stage),
            stage_name(transition.to_stage),
            if transition.wrapped { " (wrapped)" } else { "" },
            transition.state.as_str()
        );

        let summary = transition.pending.settle().await;
        if summary.failed > 0 {
            anyhow::bail!("Failed to save {} of {} change(s)", summary.failed, summary.saved + summary.failed);
        }
        Ok::<(), anyhow::Error>(())
    })?
}

fn handle_reset(settings: &Settings, store: Arc<SqliteStore>, order: &str) -> Result<()> {
    let order_id = parse_id_or_exit(order, "order");
    let profile = require_display(settings, store.clone())?;
    let mut board = load_board(settings, store, profile)?;

    block_on(async move {
        let outcome = match board.reset(order_id) {
            Ok(outcome) => outcome,
            Err(e) => user_error(&e.to_string()),
        };
        println!(
            "Order {} reset: {} line(s) back to {}",
            outcome.order_id,
            outcome.lines_reset,
            board.pipeline().first().name
        );
        let summary = outcome.pending.settle().await;
        if summary.failed > 0 {
            anyhow::bail!("Failed to save reset of order {}", order_id);
        }
        Ok::<(), anyhow::Error>(())
    })?
}

fn print_catalog(entries: &[CatalogEntry], what: &str) {
    if entries.is_empty() {
        println!("No {} found.", what);
        return;
    }
    println!("{:<6} {:<40}", "ID", "Name");
    println!("{}", "-".repeat(46));
    for entry in entries {
        println!("{:<6} {:<40}", entry.id, entry.name);
    }
}

fn id_list_or_exit(list: &str, what: &str) -> std::collections::BTreeSet<i64> {
    match parse_id_list(list, what) {
        Ok(ids) => ids,
        Err(e) => user_error(&e),
    }
}

fn handle_admin(settings: &Settings, store: &SqliteStore, cmd: AdminCommands) -> Result<()> {
    match cmd {
        AdminCommands::Stage { name, sequence, done, ready, fold } => {
            if let Err(e) = validate_non_empty(&name, "Stage name") {
                user_error(&e);
            }
            let stage = store.with_conn(|conn| StageRepo::create(conn, &name, sequence, done, ready, fold))?;
            println!("Created stage {} '{}' (sequence {})", stage.id, stage.name, stage.sequence);
            Ok(())
        }
        AdminCommands::Source { name } => match name {
            Some(name) => {
                let id = store.with_conn(|conn| CatalogRepo::create_source(conn, &name))?;
                println!("Created source {} '{}'", id, name);
                Ok(())
            }
            None => {
                print_catalog(&store.with_conn(CatalogRepo::list_sources)?, "sources");
                Ok(())
            }
        },
        AdminCommands::Category { name } => match name {
            Some(name) => {
                let id = store.with_conn(|conn| CatalogRepo::create_category(conn, &name))?;
                println!("Created category {} '{}'", id, name);
                Ok(())
            }
            None => {
                print_catalog(&store.with_conn(CatalogRepo::list_categories)?, "categories");
                Ok(())
            }
        },
        AdminCommands::Product { name, categories, recipe } => match name {
            Some(name) => {
                let categories = id_list_or_exit(&categories, "category");
                let id = store.with_conn(|conn| CatalogRepo::create_product(conn, &name, &categories, recipe))?;
                println!("Created product {} '{}'", id, name);
                Ok(())
            }
            None => {
                print_catalog(&store.with_conn(CatalogRepo::list_products)?, "products");
                Ok(())
            }
        },
        AdminCommands::Display { name, sources, categories, warning, critical, sound } => {
            if let Err(e) = validate_non_empty(&name, "Display name") {
                user_error(&e);
            }
            if warning.map_or(false, |m| m < 0) || critical.map_or(false, |m| m < 0) {
                user_error("SLA thresholds must be non-negative minutes");
            }
            let sources = id_list_or_exit(&sources, "source");
            let categories = id_list_or_exit(&categories, "category");
            let display = store.with_conn(|conn| {
                DisplayRepo::create(conn, &name, &sources, &categories, warning, critical, sound)
            })?;
            println!("Created display {} '{}'", display.id, display.name);
            Ok(())
        }
        AdminCommands::RemoveDisplay { id } => {
            let id = parse_id_or_exit(&id, "display");
            if !store.with_conn(|conn| DisplayRepo::delete(conn, id))? {
                user_error(&BoardError::UnknownDisplay(id).to_string());
            }
            println!("Deleted display {}", id);
            Ok(())
        }
        AdminCommands::Order { name, reference, source, table, lines, state, at } => {
            if let Err(e) = validate_non_empty(&name, "Order name") {
                user_error(&e);
            }
            let date_order = match at {
                Some(raw) => match parse_wire_timestamp(&raw) {
                    Ok(ts) => format_wire_timestamp(&ts),
                    Err(e) => user_error(&e.to_string()),
                },
                None => format_wire_timestamp(&Utc::now()),
            };
            let mut order_lines = Vec::new();
            for spec in &lines {
                match parse_line_spec(spec) {
                    Ok(line) => order_lines.push(line),
                    Err(e) => user_error(&e),
                }
            }

            let new_order = NewOrder {
                name: name.clone(),
                pos_reference: reference,
                source_id: source,
                table,
                state,
                date_order,
                lines: order_lines,
            };
            let order_id = store.with_conn(|conn| {
                let order_id = OrderRepo::create(conn, &new_order)?;
                BusRepo::send(conn, &settings.bus_channel, &serde_json::json!({
                    "order_id": order_id,
                    "name": name,
                }))?;
                Ok(order_id)
            })?;
            println!("Created order {} '{}' with {} line(s)", order_id, name, new_order.lines.len());
            Ok(())
        }
        AdminCommands::OrderState { order, state } => {
            let order_id = parse_id_or_exit(&order, "order");
            if let Err(e) = validate_non_empty(&state, "State") {
                user_error(&e);
            }
            let name = store.with_conn(|conn| {
                let name = OrderRepo::set_upstream_state(conn, order_id, &state)?;
                BusRepo::send(conn, &settings.bus_channel, &serde_json::json!({
                    "order_id": order_id,
                    "name": name,
                }))?;
                Ok(name)
            })?;
            println!("Order {} '{}' is now {}", order_id, name, state);
            Ok(())
        }
    }
}

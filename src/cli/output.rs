// Output formatting utilities

use crate::board::Board;
use crate::filter::ProductTally;
use crate::models::{Display, Order};
use crate::notice::{Notice, NoticeLevel};
use crate::pipeline::StagePipeline;
use crate::sla::{SlaReading, SlaTier};
use crate::utils::{format_duration_short, format_wire_timestamp};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::io::IsTerminal;

// ANSI escape codes for terminal formatting
const ANSI_BOLD: &str = "\x1b[1m";
const ANSI_DIM: &str = "\x1b[2m";
const ANSI_RESET: &str = "\x1b[0m";

const ANSI_FG_RED: &str = "\x1b[31m";
const ANSI_FG_GREEN: &str = "\x1b[32m";
const ANSI_FG_YELLOW: &str = "\x1b[33m";
const ANSI_FG_CYAN: &str = "\x1b[36m";

const ANSI_BG_RED: &str = "\x1b[41m";
const ANSI_BG_YELLOW: &str = "\x1b[43m";

// Card clock styles: black on yellow, white on red
const ANSI_WARNING: &str = "\x1b[43m\x1b[30m";
const ANSI_CRITICAL: &str = "\x1b[41m\x1b[37m";

/// Terminal bell, rung on new orders
pub const BELL: &str = "\x07";

/// Check if stdout is a terminal (TTY)
pub fn is_tty() -> bool {
    std::io::stdout().is_terminal()
}

/// Get terminal width dynamically
///
/// Uses the `terminal_size` crate for reliable detection, with fallback to
/// COLUMNS environment variable and a sensible default.
pub fn get_terminal_width() -> usize {
    if let Some((terminal_size::Width(w), _)) = terminal_size::terminal_size() {
        if w > 0 {
            return w as usize;
        }
    }

    if let Ok(cols) = std::env::var("COLUMNS") {
        if let Ok(width) = cols.parse::<usize>() {
            if width > 0 && width < 10000 {
                return width;
            }
        }
    }

    120
}

/// Apply bold formatting if in TTY mode
fn bold_if_tty(text: &str, is_tty: bool) -> String {
    if is_tty {
        format!("{}{}{}", ANSI_BOLD, text, ANSI_RESET)
    } else {
        text.to_string()
    }
}

fn tier_style(tier: SlaTier) -> Option<&'static str> {
    match tier {
        SlaTier::Normal => None,
        SlaTier::Warning => Some(ANSI_WARNING),
        SlaTier::Critical => Some(ANSI_CRITICAL),
    }
}

fn paint(text: &str, style: Option<&str>, use_color: bool) -> String {
    match style {
        Some(style) if use_color => format!("{}{}{}", style, text, ANSI_RESET),
        _ => text.to_string(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max <= 1 {
        return text.chars().take(max).collect();
    }
    let mut cut: String = text.chars().take(max - 1).collect();
    cut.push('~');
    cut
}

fn format_quantity(qty: f64) -> String {
    if qty.fract() == 0.0 {
        format!("{}", qty as i64)
    } else {
        format!("{:.2}", qty)
    }
}

pub struct BoardRenderOptions {
    pub use_color: bool,
    pub width: usize,
}

impl Default for BoardRenderOptions {
    fn default() -> Self {
        Self { use_color: is_tty(), width: get_terminal_width() }
    }
}

/// Render the visible cards.
///
/// `readings` holds the latest timer readings; cards without one are read at
/// `client_now`.
pub fn format_board(
    board: &Board,
    readings: &HashMap<i64, SlaReading>,
    client_now: DateTime<Utc>,
    opts: &BoardRenderOptions,
) -> String {
    let mut out = String::new();
    let profile = board.profile();

    let mut header = format!("Display: {} (#{})", profile.display.name, profile.display.id);
    if let Some(product) = board.focus().product() {
        header.push_str(&format!("  [focus: product {}]", product));
    }
    out.push_str(&bold_if_tty(&header, opts.use_color));
    out.push('\n');

    let visible = board.visible();
    if visible.is_empty() {
        out.push_str("No orders.\n");
        return out;
    }

    let pipeline = board.pipeline();
    let mut oldest = 0;
    for order in &visible {
        let reading = readings
            .get(&order.id)
            .copied()
            .unwrap_or_else(|| board.reading(order, client_now));
        oldest = oldest.max(reading.elapsed_secs);
        out.push_str(&format_card(order, pipeline, &reading, opts));
    }

    out.push_str(&format!(
        "{} order(s), oldest {}\n",
        visible.len(),
        format_duration_short(oldest)
    ));
    out
}

fn format_card(order: &Order, pipeline: &StagePipeline, reading: &SlaReading, opts: &BoardRenderOptions) -> String {
    let mut title = format!("#{} {}", order.id, order.display_reference);
    if let Some(table) = &order.table {
        title.push_str(&format!(" [Table {}]", table));
    }
    let clock = paint(&format!(" {} ", reading.duration_text()), tier_style(reading.tier), opts.use_color);
    let state = paint(
        order.completion_state.as_str(),
        if opts.use_color { Some(ANSI_DIM) } else { None },
        opts.use_color,
    );

    let mut out = format!("{}  {}  {}\n", bold_if_tty(&title, opts.use_color), clock, state);

    // id + qty + stage columns leave the rest for the product name
    let name_width = opts.width.saturating_sub(30).max(12);
    for line in &order.lines {
        let stage = pipeline.get(line.current_stage_id);
        let stage_name = stage.map(|s| s.name.as_str()).unwrap_or("?");
        let stage_color = match stage {
            Some(s) if s.is_terminal => Some(ANSI_FG_GREEN),
            Some(s) if s.is_ready => Some(ANSI_FG_CYAN),
            _ => None,
        };
        out.push_str(&format!(
            "  {:>6}  {:>5} x {:<width$}  [{}]\n",
            line.id,
            format_quantity(line.quantity),
            truncate(&line.product_name, name_width),
            paint(stage_name, stage_color, opts.use_color),
            width = name_width,
        ));
    }
    out
}

/// Board as JSON (one object per visible order)
pub fn format_board_json(board: &Board, client_now: DateTime<Utc>) -> Result<String> {
    let pipeline = board.pipeline();
    let orders: Vec<serde_json::Value> = board
        .visible()
        .into_iter()
        .map(|order| {
            let reading = board.reading(order, client_now);
            let lines: Vec<serde_json::Value> = order
                .lines
                .iter()
                .map(|line| {
                    serde_json::json!({
                        "id": line.id,
                        "product_id": line.product_id,
                        "product": line.product_name,
                        "quantity": line.quantity,
                        "category_ids": line.category_ids,
                        "stage_id": line.current_stage_id,
                        "stage": pipeline.get(line.current_stage_id).map(|s| s.name.clone()),
                        "stage_assigned": line.stage_assigned,
                        "has_recipe": line.has_recipe,
                    })
                })
                .collect();
            serde_json::json!({
                "id": order.id,
                "reference": order.display_reference,
                "source_id": order.source_id,
                "table": order.table,
                "created_at": format_wire_timestamp(&order.created_at),
                "state": order.completion_state,
                "elapsed_secs": reading.elapsed_secs,
                "elapsed": reading.duration_text(),
                "tier": reading.tier,
                "lines": lines,
            })
        })
        .collect();
    Ok(serde_json::to_string_pretty(&orders)?)
}

pub fn format_tally(tally: &[ProductTally]) -> String {
    if tally.is_empty() {
        return "No products on the board.\n".to_string();
    }
    let mut out = format!("{:<8} {:<40} {:>8}\n", "ID", "Product", "Qty");
    out.push_str(&format!("{}\n", "-".repeat(58)));
    for entry in tally {
        out.push_str(&format!(
            "{:<8} {:<40} {:>8}\n",
            entry.product_id,
            truncate(&entry.name, 40),
            format_quantity(entry.quantity)
        ));
    }
    out
}

pub fn format_displays(displays: &[Display], active: Option<i64>) -> String {
    if displays.is_empty() {
        return "No displays configured. Create one with 'kboard admin display <name>'.\n".to_string();
    }
    let mut out = format!("{:<6} {:<24} {:<16} {:<16} {:<8}\n", "ID", "Name", "Sources", "Categories", "SLA");
    out.push_str(&format!("{}\n", "-".repeat(74)));
    for display in displays {
        let marker = if Some(display.id) == active { "*" } else { "" };
        let sla = match (display.sla_warning_minutes, display.sla_critical_minutes) {
            (None, None) => "default".to_string(),
            (w, c) => format!(
                "{}/{}",
                w.map(|m| m.to_string()).unwrap_or_else(|| "-".to_string()),
                c.map(|m| m.to_string()).unwrap_or_else(|| "-".to_string())
            ),
        };
        out.push_str(&format!(
            "{:<6} {:<24} {:<16} {:<16} {:<8}\n",
            format!("{}{}", display.id, marker),
            truncate(&display.name, 24),
            format_id_set(display.allowed_source_ids.iter()),
            format_id_set(display.allowed_category_ids.iter()),
            sla,
        ));
    }
    out
}

fn format_id_set<'a>(ids: impl Iterator<Item = &'a i64>) -> String {
    let list: Vec<String> = ids.map(|id| id.to_string()).collect();
    if list.is_empty() {
        "all".to_string()
    } else {
        truncate(&list.join(","), 16)
    }
}

pub fn format_stages(pipeline: &StagePipeline) -> String {
    let mut out = format!("{:<6} {:<24} {:>8}  {}\n", "ID", "Stage", "Sequence", "Flags");
    out.push_str(&format!("{}\n", "-".repeat(50)));
    for stage in pipeline.stages() {
        let mut flags = Vec::new();
        if stage.is_terminal {
            flags.push("done");
        }
        if stage.is_ready {
            flags.push("ready");
        }
        if stage.fold {
            flags.push("fold");
        }
        out.push_str(&format!(
            "{:<6} {:<24} {:>8}  {}\n",
            stage.id,
            truncate(&stage.name, 24),
            stage.sequence,
            flags.join(",")
        ));
    }
    out.push_str(&format!("Wrap policy: {}\n", pipeline.policy().as_str()));
    out
}

pub fn format_notice(notice: &Notice, use_color: bool) -> String {
    let style = match notice.level {
        NoticeLevel::Info => ANSI_FG_CYAN,
        NoticeLevel::Success => ANSI_FG_GREEN,
        NoticeLevel::Warning => ANSI_FG_YELLOW,
        NoticeLevel::Danger => ANSI_FG_RED,
    };
    paint(&notice.message, Some(style), use_color)
}

/// Legend shown under the live board
pub fn format_watch_help(use_color: bool) -> String {
    let legend = format!(
        "{} warning  {} critical",
        paint("    ", Some(ANSI_BG_YELLOW), use_color),
        paint("    ", Some(ANSI_BG_RED), use_color),
    );
    format!(
        "{}\nCommands: a <order> <line> | r <order> | c <order> | f <product> | d <display> | m | g | q\n",
        legend
    )
}

/// Clear-screen prefix for redraws
pub fn clear_screen(use_color: bool) -> &'static str {
    if use_color {
        "\x1b[2J\x1b[H"
    } else {
        ""
    }
}

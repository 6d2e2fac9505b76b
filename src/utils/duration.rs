// Elapsed-time formatting for board cards

/// Format seconds as the card clock `MM:SS`
///
/// Minutes are not wrapped into hours; a two-hour-old order shows `120:00`.
/// Negative input renders as `00:00`.
pub fn format_card_clock(secs: i64) -> String {
    let secs = secs.max(0);
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Format duration for summaries (e.g., "2h30m", "45m", "15s")
pub fn format_duration_short(secs: i64) -> String {
    let secs = secs.max(0);
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}h{}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m", minutes)
    } else {
        format!("{}s", seconds)
    }
}

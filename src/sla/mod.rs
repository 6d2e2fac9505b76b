//! Service-level escalation of orders by age.
//!
//! Classification is recomputed from scratch on every tick; it carries no
//! history and only moves with the clock.

pub mod timer;

pub use timer::{CardClock, CardTimers, SlaTick};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::ClockOffset;
use crate::utils::format_card_clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaTier {
    Normal,
    Warning,
    Critical,
}

impl SlaTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlaTier::Normal => "normal",
            SlaTier::Warning => "warning",
            SlaTier::Critical => "critical",
        }
    }
}

/// Minute thresholds; critical is checked first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaThresholds {
    pub warning_minutes: i64,
    pub critical_minutes: i64,
}

impl SlaThresholds {
    pub fn classify(&self, elapsed_secs: i64) -> SlaTier {
        if elapsed_secs >= self.critical_minutes * 60 {
            SlaTier::Critical
        } else if elapsed_secs >= self.warning_minutes * 60 {
            SlaTier::Warning
        } else {
            SlaTier::Normal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaReading {
    pub elapsed_secs: i64,
    pub tier: SlaTier,
}

impl SlaReading {
    pub fn duration_text(&self) -> String {
        format_card_clock(self.elapsed_secs)
    }

    pub fn elapsed_minutes(&self) -> i64 {
        self.elapsed_secs / 60
    }
}

/// Seconds since `created_at` on the server clock, never negative
pub fn elapsed_secs(created_at: DateTime<Utc>, client_now: DateTime<Utc>, offset: ClockOffset) -> i64 {
    (offset.to_server_time(client_now) - created_at).num_seconds().max(0)
}

pub fn read(
    created_at: DateTime<Utc>,
    client_now: DateTime<Utc>,
    offset: ClockOffset,
    thresholds: &SlaThresholds,
) -> SlaReading {
    let elapsed_secs = elapsed_secs(created_at, client_now, offset);
    SlaReading { elapsed_secs, tier: thresholds.classify(elapsed_secs) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    const KITCHEN: SlaThresholds = SlaThresholds { warning_minutes: 15, critical_minutes: 30 };

    #[test]
    fn test_threshold_boundaries() {
        assert_eq!(KITCHEN.classify(14 * 60 + 59), SlaTier::Normal);
        assert_eq!(KITCHEN.classify(15 * 60), SlaTier::Warning);
        assert_eq!(KITCHEN.classify(29 * 60 + 59), SlaTier::Warning);
        assert_eq!(KITCHEN.classify(30 * 60), SlaTier::Critical);
    }

    #[test]
    fn test_monotonic_in_elapsed_time() {
        let mut previous = SlaTier::Normal;
        for secs in (0..3 * 3600).step_by(7) {
            let tier = KITCHEN.classify(secs);
            assert!(tier >= previous, "tier went backwards at {}s", secs);
            previous = tier;
        }
    }

    #[test]
    fn test_skew_corrected() {
        let real_now = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        let client_now = real_now + Duration::minutes(5);
        let offset = ClockOffset(Duration::minutes(5).num_milliseconds());
        let created_at = real_now - Duration::minutes(10);

        let reading = read(created_at, client_now, offset, &KITCHEN);
        assert_eq!(reading.elapsed_minutes(), 10);
        assert_eq!(reading.tier, SlaTier::Normal);

        // Without correction the same order would look 15 minutes old
        let uncorrected = read(created_at, client_now, ClockOffset(0), &KITCHEN);
        assert_eq!(uncorrected.elapsed_minutes(), 15);
        assert_eq!(uncorrected.tier, SlaTier::Warning);
    }

    #[test]
    fn test_future_orders_clamp_to_zero() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        let reading = read(now + Duration::minutes(2), now, ClockOffset(0), &KITCHEN);
        assert_eq!(reading.elapsed_secs, 0);
        assert_eq!(reading.duration_text(), "00:00");
    }

    #[test]
    fn test_critical_checked_first() {
        let odd = SlaThresholds { warning_minutes: 20, critical_minutes: 10 };
        assert_eq!(odd.classify(12 * 60), SlaTier::Critical);
    }
}

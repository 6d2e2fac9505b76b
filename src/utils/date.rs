// Wire timestamp parsing
//
// Upstream timestamps arrive either zoned (RFC 3339) or naive. Naive values
// are always UTC, never local time.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use crate::error::BoardError;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parse an upstream timestamp and normalize it to UTC
pub fn parse_wire_timestamp(raw: &str) -> Result<DateTime<Utc>, BoardError> {
    let value = raw.trim();

    if let Ok(zoned) = DateTime::parse_from_rfc3339(value) {
        return Ok(zoned.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }

    // Date-only values mean midnight UTC
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }

    Err(BoardError::InvalidTimestamp(raw.to_string()))
}

/// Format a UTC timestamp in the store's naive wire format
pub fn format_wire_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_naive_is_utc() {
        let ts = parse_wire_timestamp("2026-03-01 12:30:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap());

        let ts = parse_wire_timestamp("2026-03-01T12:30:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap());
    }

    #[test]
    fn test_fractional_seconds() {
        let ts = parse_wire_timestamp("2026-03-01 12:30:00.250").unwrap();
        assert_eq!(ts.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_zoned_is_converted() {
        let ts = parse_wire_timestamp("2026-03-01T14:30:00+02:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap());

        let ts = parse_wire_timestamp("2026-03-01T12:30:00Z").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap());
    }

    #[test]
    fn test_date_only() {
        let ts = parse_wire_timestamp("2026-03-01").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_invalid() {
        assert!(parse_wire_timestamp("yesterday").is_err());
        assert!(parse_wire_timestamp("").is_err());
    }

    #[test]
    fn test_format_round_trip() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 9, 5, 7).unwrap();
        assert_eq!(format_wire_timestamp(&ts), "2026-03-01 09:05:07");
    }
}

use std::time::{SystemTime, UNIX_EPOCH};
use chrono::DateTime;

/// Label used when a record carries no producer-assigned timestamp.
pub const UNKNOWN_TIME: &str = "unknown";

pub fn current_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Formats epoch milliseconds as `YYYY-MM-DD HH:MM:SS` (UTC).
pub fn format_epoch_ms(ms: i64) -> String {
    match DateTime::from_timestamp_millis(ms) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => UNKNOWN_TIME.to_string(),
    }
}

/// Wall-clock `HH:MM:SS` used by the send history.
pub fn clock_label() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_epoch_millis_in_utc() {
        assert_eq!(format_epoch_ms(0), "1970-01-01 00:00:00");
        assert_eq!(format_epoch_ms(1_700_000_000_000), "2023-11-14 22:13:20");
    }

    #[test]
    fn out_of_range_timestamp_is_unknown() {
        assert_eq!(format_epoch_ms(i64::MAX), UNKNOWN_TIME);
    }
}

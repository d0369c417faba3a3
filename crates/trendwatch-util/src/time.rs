//! Time utilities for trendwatch
//!
//! # Mock Time for Development
//!
//! In debug builds, the `TRENDWATCH_MOCK_TIME` environment variable can be set
//! to override the system time for all time-sensitive operations. This is useful
//! for exercising alert cooldowns and "created in the last hour" queries without
//! waiting for the wall clock.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2025-12-25 14:30:00`)
//!
//! Example:
//! ```bash
//! TRENDWATCH_MOCK_TIME="2025-12-25 14:30:00" trendwatchd alerts
//! ```

use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use std::sync::OnceLock;
use std::time::Duration;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "TRENDWATCH_MOCK_TIME";

/// Format accepted by `TRENDWATCH_MOCK_TIME`
const MOCK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Cached mock time offset from the real time when the process started.
/// This allows mock time to advance naturally.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

#[allow(clippy::disallowed_methods)] // This is the internal implementation that wraps Local::now()
fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            if let Ok(mock_time_str) = std::env::var(MOCK_TIME_ENV_VAR) {
                return parse_mock_offset(&mock_time_str, chrono::Local::now());
            }
            None
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Compute the offset between a mock time string and `real_now`
#[cfg_attr(not(debug_assertions), allow(dead_code))]
fn parse_mock_offset(mock_time_str: &str, real_now: DateTime<Local>) -> Option<chrono::Duration> {
    let Ok(naive_dt) = NaiveDateTime::parse_from_str(mock_time_str, MOCK_TIME_FORMAT) else {
        tracing::warn!(
            mock_time = %mock_time_str,
            expected_format = MOCK_TIME_FORMAT,
            "Invalid mock time format"
        );
        return None;
    };

    let Some(mock_dt) = Local.from_local_datetime(&naive_dt).single() else {
        tracing::warn!(
            mock_time = %mock_time_str,
            "Failed to convert mock time to local timezone"
        );
        return None;
    };

    let offset = mock_dt.signed_duration_since(real_now);
    tracing::info!(
        mock_time = %mock_time_str,
        offset_secs = offset.num_seconds(),
        "Mock time enabled"
    );
    Some(offset)
}

/// Get the current local time, respecting mock time settings in debug builds.
#[allow(clippy::disallowed_methods)] // This is the wrapper that provides mock time support
pub fn now() -> DateTime<Local> {
    let real_now = chrono::Local::now();

    if let Some(offset) = get_mock_time_offset() {
        real_now + offset
    } else {
        real_now
    }
}

/// Format a DateTime for display with full date and time.
pub fn format_datetime_full(dt: &DateTime<Local>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Serialize a timestamp for storage.
///
/// Always UTC with a fixed number of fractional digits, so the lexical order of
/// the strings equals chronological order.
pub fn to_storage_timestamp(dt: &DateTime<Local>) -> String {
    dt.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a timestamp written by [`to_storage_timestamp`]
pub fn from_storage_timestamp(s: &str) -> Option<DateTime<Local>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Local))
        .ok()
}

/// Format a duration as human-readable string
pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h 1m 1s");
    }

    #[test]
    fn test_format_datetime_full() {
        let dt = Local.with_ymd_and_hms(2025, 12, 25, 14, 30, 45).unwrap();
        assert_eq!(format_datetime_full(&dt), "2025-12-25 14:30:45");
    }

    #[test]
    fn test_now_returns_time() {
        let t = now();
        assert!(t.year() >= 2020);
        assert!(t.year() <= 2100);
    }

    #[test]
    fn test_mock_time_env_var_name() {
        assert_eq!(MOCK_TIME_ENV_VAR, "TRENDWATCH_MOCK_TIME");
    }

    #[test]
    fn test_parse_mock_offset() {
        let real_now = Local.with_ymd_and_hms(2025, 12, 25, 12, 0, 0).unwrap();
        let offset = parse_mock_offset("2025-12-25 14:30:00", real_now).unwrap();
        assert_eq!(offset, chrono::Duration::minutes(150));
    }

    #[test]
    fn test_parse_mock_offset_rejects_bad_formats() {
        let real_now = Local.with_ymd_and_hms(2025, 12, 25, 12, 0, 0).unwrap();
        for bad in ["2025-12-25", "14:30:00", "2025-12-25T14:30:00", "", "not a date"] {
            assert!(parse_mock_offset(bad, real_now).is_none(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_storage_timestamp_roundtrip() {
        let dt = Local.with_ymd_and_hms(2025, 3, 1, 8, 15, 0).unwrap();
        let s = to_storage_timestamp(&dt);
        assert!(s.ends_with('Z'));
        assert_eq!(from_storage_timestamp(&s).unwrap(), dt);
    }

    #[test]
    fn test_storage_timestamp_sorts_chronologically() {
        let earlier = Local.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        let later = earlier + chrono::Duration::milliseconds(1500);
        assert!(to_storage_timestamp(&earlier) < to_storage_timestamp(&later));
    }
}

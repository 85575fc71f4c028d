//! Calendar date helpers (UTC, Unix milliseconds)

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{TaskError, TaskResult};

fn parse_day(s: &str) -> TaskResult<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| TaskError::validation(format!("Invalid date '{}' (expected YYYY-MM-DD): {}", s, e)))
}

/// First millisecond of the given day
pub fn day_start_ms(s: &str) -> TaskResult<i64> {
    let day = parse_day(s)?;
    day.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
        .ok_or_else(|| TaskError::validation(format!("Invalid date '{}'", s)))
}

/// Last millisecond of the given day
pub fn day_end_ms(s: &str) -> TaskResult<i64> {
    let day = parse_day(s)?;
    day.and_hms_milli_opt(23, 59, 59, 999)
        .map(|dt| dt.and_utc().timestamp_millis())
        .ok_or_else(|| TaskError::validation(format!("Invalid date '{}'", s)))
}

/// Render a millisecond timestamp as `YYYY-MM-DD`
pub fn format_date(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| ms.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_bounds() {
        let start = day_start_ms("2024-05-01").unwrap();
        let end = day_end_ms("2024-05-01").unwrap();
        assert_eq!(start, 1_714_521_600_000);
        assert_eq!(end - start, 86_400_000 - 1);
        assert_eq!(format_date(start), "2024-05-01");
        assert_eq!(format_date(end), "2024-05-01");
    }

    #[test]
    fn test_invalid_date() {
        assert!(day_start_ms("05/01/2024").is_err());
        assert!(day_end_ms("2024-13-01").is_err());
    }
}

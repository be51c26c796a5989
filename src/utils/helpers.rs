//! Helper functions and utilities
//!
//! This module contains common helper functions used throughout the application.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use crate::utils::errors::{EventDeskError, Result};

/// Format a timestamp for display
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Truncate text to a maximum number of characters with ellipsis
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Parse user mention from text
pub fn parse_user_mention(text: &str) -> Option<i64> {
    let text = text.trim();
    if text.starts_with('@') {
        // Usernames need a database lookup
        None
    } else if let Some(id_str) = text.strip_prefix("tg://user?id=") {
        id_str.parse::<i64>().ok()
    } else {
        text.parse::<i64>().ok()
    }
}

/// Parse a numeric id given as a command argument
pub fn parse_id_argument(arg: &str) -> Result<i64> {
    let arg = arg.trim().trim_start_matches('#');
    arg.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| EventDeskError::InvalidInput(format!("Expected a numeric id, got '{}'", arg)))
}

/// Combine a `YYYY-MM-DD` date and `HH:MM` time (UTC) into a timestamp
pub fn combine_date_time(date: &str, time: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|_| EventDeskError::InvalidInput(format!("Invalid date: {}", date)))?;
    let time = NaiveTime::parse_from_str(time.trim(), "%H:%M")
        .map_err(|_| EventDeskError::InvalidInput(format!("Invalid time: {}", time)))?;

    Ok(Utc.from_utc_datetime(&date.and_time(time)))
}

/// Sanitize filename for safe storage
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Normalize whitespace in text
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello world", 8), "hello...");
        assert_eq!(truncate_text("привет мир", 7), "прив...");
    }

    #[test]
    fn test_parse_user_mention() {
        assert_eq!(parse_user_mention("123456789"), Some(123456789));
        assert_eq!(parse_user_mention("tg://user?id=123456789"), Some(123456789));
        assert_eq!(parse_user_mention("@username"), None);
    }

    #[test]
    fn test_parse_id_argument() {
        assert_eq!(parse_id_argument(" 42 ").unwrap(), 42);
        assert_eq!(parse_id_argument("#7").unwrap(), 7);
        assert!(parse_id_argument("").is_err());
        assert!(parse_id_argument("-3").is_err());
        assert!(parse_id_argument("abc").is_err());
    }

    #[test]
    fn test_combine_date_time() {
        let ts = combine_date_time("2024-05-17", "19:30").unwrap();
        assert_eq!((ts.year(), ts.month(), ts.day()), (2024, 5, 17));
        assert_eq!((ts.hour(), ts.minute()), (19, 30));
        assert!(combine_date_time("17.05.2024", "19:30").is_err());
        assert!(combine_date_time("2024-05-17", "7pm").is_err());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("CERT 2024/01"), "CERT_2024_01");
    }
}

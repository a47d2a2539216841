//! Date/time utilities for junkmail.
//!
//! Timestamps crossing the store boundary are Unix epoch milliseconds.

use chrono::{DateTime, Utc};

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Format epoch milliseconds as RFC3339 (UTC), for log lines.
///
/// Returns the raw number if it is out of chrono's range.
pub fn format_millis(millis: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(millis) {
        Some(dt) => dt.to_rfc3339(),
        None => millis.to_string(),
    }
}

//! Courier timestamp parsing.
//!
//! Couriers report naive local timestamps in their own formats. They are
//! read as UTC; anything unparseable becomes `None` rather than an error.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Parse `input` with a `chrono` format string.
pub fn parse_timestamp(input: &str, format: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    match NaiveDateTime::parse_from_str(input, format) {
        Ok(naive) => Some(naive.and_utc()),
        Err(e) => {
            tracing::debug!(input, format, error = %e, "unparseable courier timestamp");
            None
        }
    }
}

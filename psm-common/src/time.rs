//! Timestamp utilities
//!
//! Timestamps are persisted as RFC 3339 strings in UTC so that lexical
//! order in SQLite matches chronological order.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp for storage (fixed-width, millisecond precision)
pub fn to_db(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp
pub fn from_db(value: &str) -> crate::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| crate::Error::Internal(format!("Invalid stored timestamp '{}': {}", value, e)))
}

/// Start of the rolling 24-hour window ending at `at`
pub fn rolling_day_start(at: DateTime<Utc>) -> DateTime<Utc> {
    at - Duration::hours(24)
}

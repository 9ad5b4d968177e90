//! Timestamp helpers.
//!
//! SQLite stores timestamps as `YYYY-MM-DD HH:MM:SS` in UTC
//! (`datetime('now')`); the API returns RFC3339.

use chrono::{NaiveDateTime, Utc};

const SQLITE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current UTC time in the format SQLite's `datetime('now')` produces.
pub fn now_sqlite() -> String {
    Utc::now().format(SQLITE_FORMAT).to_string()
}

/// Convert a database datetime string (YYYY-MM-DD HH:MM:SS) to RFC3339.
///
/// Values that don't parse are returned unchanged.
pub fn to_rfc3339(datetime_str: &str) -> String {
    match NaiveDateTime::parse_from_str(datetime_str, SQLITE_FORMAT) {
        Ok(dt) => format!("{}Z", dt.format("%Y-%m-%dT%H:%M:%S")),
        Err(_) => datetime_str.to_string(),
    }
}

//! Clock helpers.
//!
//! All persisted timestamps in Loomnet are milliseconds since the Unix
//! epoch, signed to match SQLite's INTEGER affinity.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current timestamp in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as i64
}

use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock time in epoch milliseconds, the unit every store persists.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

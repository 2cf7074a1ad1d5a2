//! Timestamp utilities

use chrono::Utc;

/// Current Unix epoch time in milliseconds
///
/// Client telemetry and stored records all use epoch milliseconds, matching
/// the client-side `Date.now()` clock.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms_returns_valid_timestamp() {
        let ms = now_ms();
        // Should be a reasonable timestamp (after 2000-01-01 00:00:00 UTC)
        assert!(ms > 946_684_800_000);
    }
}

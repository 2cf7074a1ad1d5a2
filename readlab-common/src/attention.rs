//! Attention-time buckets
//!
//! Each session accumulates focused time into a fixed, closed set of
//! pipeline-stage buckets. Unknown bucket names never create new buckets:
//! client/server version skew is expected, so such calls are no-ops that
//! still succeed. Malformed or oversized increments are clamped rather than
//! rejected so a broken client cannot corrupt aggregate statistics.

use serde::{Deserialize, Serialize};

/// The closed set of pipeline stages
pub const BUCKETS: [&str; 10] = [
    "consent",
    "demographic",
    "reading_instruction",
    "reading_task1",
    "survey_task1",
    "reading_task2",
    "survey_task2",
    "reading_task3",
    "survey_task3",
    "vocabulary",
];

/// Sanity cap on one increment: 4 hours
pub const MAX_SINGLE_INCREMENT_MS: i64 = 4 * 60 * 60 * 1000;

/// Outcome of one attention-time accumulation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttentionOutcome {
    /// Increment applied; new cumulative total for the bucket
    Recorded { bucket: String, total_ms: i64 },
    /// Unrecognized bucket name; nothing stored
    Ignored { bucket: String },
}

/// True when the name belongs to the closed bucket set
pub fn is_known_bucket(bucket: &str) -> bool {
    BUCKETS.contains(&bucket)
}

/// Coerce an elapsed-time report to a safe increment
///
/// Negative or otherwise malformed values become 0; a single report larger
/// than the sanity cap is clamped to the cap.
pub fn clamp_elapsed(elapsed_ms: i64) -> i64 {
    elapsed_ms.clamp(0, MAX_SINGLE_INCREMENT_MS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_set_is_closed() {
        assert!(is_known_bucket("consent"));
        assert!(is_known_bucket("reading_task3"));
        assert!(is_known_bucket("vocabulary"));
        assert!(!is_known_bucket("reading_task4"));
        assert!(!is_known_bucket(""));
        assert!(!is_known_bucket("Consent"));
    }

    #[test]
    fn test_negative_elapsed_coerces_to_zero() {
        assert_eq!(clamp_elapsed(-50), 0);
        assert_eq!(clamp_elapsed(0), 0);
    }

    #[test]
    fn test_elapsed_passes_through_in_range() {
        assert_eq!(clamp_elapsed(100), 100);
        assert_eq!(clamp_elapsed(MAX_SINGLE_INCREMENT_MS), MAX_SINGLE_INCREMENT_MS);
    }

    #[test]
    fn test_oversized_elapsed_is_capped() {
        assert_eq!(clamp_elapsed(MAX_SINGLE_INCREMENT_MS + 1), MAX_SINGLE_INCREMENT_MS);
        assert_eq!(clamp_elapsed(i64::MAX), MAX_SINGLE_INCREMENT_MS);
    }
}

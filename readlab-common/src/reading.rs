//! Reading-event reconciliation
//!
//! Client-side visibility-change events are inherently noisy: browsers race
//! focus detection on page load, and rapid alt-tabbing produces bursts of
//! near-zero segments. The reconciler turns that stream into an analyzable
//! timeline without discarding genuine attention-loss signal.
//!
//! The decision logic is a pure function over (stored state for the passage,
//! incoming event) so both storage backends share it. Rules, in order:
//!
//! 1. A leading tiny "blur" with page "unknown" before any "active" for the
//!    passage is a focus-detection artifact; suppress it.
//! 2. The first "active" retroactively deletes such a tiny blur if it is the
//!    most recently stored event for the passage.
//! 3. Segments below the minimum meaningful duration are noise; discard.
//! 4. An event adjacent to the last stored segment with the same status and
//!    page merges into it instead of appending.
//! 5. Everything else is clamped to the maximum segment length and appended.

use crate::time;
use serde::{Deserialize, Serialize};

/// A blur at or under this length, before any active, is a load artifact
pub const SPURIOUS_BLUR_MAX_MS: i64 = 250;

/// Segments shorter than this are debounce noise
pub const MIN_SEGMENT_MS: i64 = 40;

/// Maximum gap between adjacent same-state segments that still merges
pub const MERGE_GAP_MAX_MS: i64 = 500;

/// Hard ceiling on any single stored segment: 30 minutes
pub const MAX_SEGMENT_MS: i64 = 30 * 60 * 1000;

/// Sentinel page name clients send before the page identifies itself
pub const UNKNOWN_PAGE: &str = "unknown";

/// Client-reported visibility state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisibilityStatus {
    Active,
    Blur,
}

impl VisibilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisibilityStatus::Active => "active",
            VisibilityStatus::Blur => "blur",
        }
    }

    /// Lenient parse; unrecognized states count as "active"
    pub fn parse_lenient(s: &str) -> VisibilityStatus {
        match s {
            "blur" => VisibilityStatus::Blur,
            _ => VisibilityStatus::Active,
        }
    }
}

/// One stored reading event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingEvent {
    pub passage_key: String,
    pub status: VisibilityStatus,
    pub page_name: String,
    /// Client-reported start time (epoch ms); ordering key
    pub start_time: i64,
    pub duration_ms: i64,
    /// Server receipt time (epoch ms)
    pub server_ts: i64,
}

/// An incoming, not-yet-stored event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingEvent {
    pub passage_key: String,
    pub status: VisibilityStatus,
    pub page_name: String,
    pub start_time: i64,
    pub duration_ms: i64,
}

impl IncomingEvent {
    /// Coerce raw client fields to safe values: negative durations become 0,
    /// an empty page name becomes the "unknown" sentinel.
    pub fn sanitized(
        passage_key: &str,
        status: VisibilityStatus,
        page_name: Option<&str>,
        start_time: i64,
        duration_ms: i64,
    ) -> IncomingEvent {
        let page = match page_name {
            Some(p) if !p.trim().is_empty() => p.to_string(),
            _ => UNKNOWN_PAGE.to_string(),
        };
        IncomingEvent {
            passage_key: passage_key.to_string(),
            status,
            page_name: page,
            start_time,
            duration_ms: duration_ms.max(0),
        }
    }

    fn is_tiny_unknown_blur(&self) -> bool {
        self.status == VisibilityStatus::Blur
            && self.page_name == UNKNOWN_PAGE
            && self.duration_ms <= SPURIOUS_BLUR_MAX_MS
    }
}

/// The stored state the reconciler needs: whether any "active" exists for
/// the passage, and the most recently stored event for the passage.
#[derive(Debug, Clone, Default)]
pub struct ReconcileContext {
    pub has_active: bool,
    pub last_for_passage: Option<ReadingEvent>,
}

impl ReconcileContext {
    /// Build the context from a session's full event list
    pub fn from_events(events: &[ReadingEvent], passage_key: &str) -> ReconcileContext {
        ReconcileContext {
            has_active: events
                .iter()
                .any(|e| e.passage_key == passage_key && e.status == VisibilityStatus::Active),
            last_for_passage: events
                .iter()
                .rev()
                .find(|e| e.passage_key == passage_key)
                .cloned(),
        }
    }
}

/// Why an incoming event was not stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressReason {
    /// Leading tiny blur with unknown page (rule 1)
    LeadingSpuriousBlur,
    /// Below the minimum meaningful duration (rule 3)
    MicroSegment,
}

/// What the store should do with the incoming event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Discard without storing
    Suppress(SuppressReason),
    /// Extend the last stored segment for the passage to this duration
    Merge { new_duration_ms: i64 },
    /// Append as a new record with this (possibly clamped) duration
    Append { duration_ms: i64 },
}

/// Full reconciliation decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Delete the last stored event for the passage first (rule 2)
    pub drop_last: bool,
    pub action: ReconcileAction,
}

fn is_tiny_unknown_blur(ev: &ReadingEvent) -> bool {
    ev.status == VisibilityStatus::Blur
        && ev.page_name == UNKNOWN_PAGE
        && ev.duration_ms <= SPURIOUS_BLUR_MAX_MS
}

/// Decide how one incoming event reconciles against stored state
pub fn reconcile(ctx: &ReconcileContext, incoming: &IncomingEvent) -> Reconciliation {
    // Rule 1: leading spurious blur
    if !ctx.has_active && incoming.is_tiny_unknown_blur() {
        return Reconciliation {
            drop_last: false,
            action: ReconcileAction::Suppress(SuppressReason::LeadingSpuriousBlur),
        };
    }

    // Rule 2: the first active retroactively deletes a trailing tiny blur
    let mut drop_last = false;
    let mut last = ctx.last_for_passage.as_ref();
    if incoming.status == VisibilityStatus::Active && !ctx.has_active {
        if let Some(ev) = last {
            if is_tiny_unknown_blur(ev) {
                drop_last = true;
                last = None;
            }
        }
    }

    // Rule 3: micro-segment debounce
    if incoming.duration_ms < MIN_SEGMENT_MS {
        return Reconciliation {
            drop_last,
            action: ReconcileAction::Suppress(SuppressReason::MicroSegment),
        };
    }

    // Rule 4: adjacent same-state merge
    if let Some(ev) = last {
        if ev.status == incoming.status
            && ev.page_name == incoming.page_name
            && incoming.start_time >= ev.start_time
        {
            let gap = incoming.start_time - (ev.start_time + ev.duration_ms);
            if gap <= MERGE_GAP_MAX_MS {
                // Extend to cover the incoming segment; never shrink (a
                // retried report can overlap the stored one).
                let extended = (incoming.start_time + incoming.duration_ms - ev.start_time)
                    .max(ev.duration_ms)
                    .min(MAX_SEGMENT_MS);
                return Reconciliation {
                    drop_last,
                    action: ReconcileAction::Merge {
                        new_duration_ms: extended,
                    },
                };
            }
        }
    }

    // Rule 5: clamp and append
    Reconciliation {
        drop_last,
        action: ReconcileAction::Append {
            duration_ms: incoming.duration_ms.min(MAX_SEGMENT_MS),
        },
    }
}

/// Result of recording one event, as seen by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ReadingOutcome {
    Stored(ReadingEvent),
    Merged(ReadingEvent),
    Suppressed { reason: SuppressReason },
}

/// Apply a reconciliation decision to an in-memory event list
///
/// Shared by the in-memory backend and by tests; the SQLite backend applies
/// the same decision with row operations.
pub fn apply_to_events(
    events: &mut Vec<ReadingEvent>,
    incoming: IncomingEvent,
    server_ts: i64,
) -> ReadingOutcome {
    let ctx = ReconcileContext::from_events(events, &incoming.passage_key);
    let decision = reconcile(&ctx, &incoming);

    if decision.drop_last {
        if let Some(pos) = events
            .iter()
            .rposition(|e| e.passage_key == incoming.passage_key)
        {
            events.remove(pos);
        }
    }

    match decision.action {
        ReconcileAction::Suppress(reason) => ReadingOutcome::Suppressed { reason },
        ReconcileAction::Merge { new_duration_ms } => {
            // A merge decision implies a stored segment for the passage
            match events
                .iter()
                .rposition(|e| e.passage_key == incoming.passage_key)
            {
                Some(pos) => {
                    events[pos].duration_ms = new_duration_ms;
                    events[pos].server_ts = server_ts;
                    ReadingOutcome::Merged(events[pos].clone())
                }
                None => {
                    let record = ReadingEvent {
                        passage_key: incoming.passage_key,
                        status: incoming.status,
                        page_name: incoming.page_name,
                        start_time: incoming.start_time,
                        duration_ms: new_duration_ms,
                        server_ts,
                    };
                    events.push(record.clone());
                    ReadingOutcome::Stored(record)
                }
            }
        }
        ReconcileAction::Append { duration_ms } => {
            let record = ReadingEvent {
                passage_key: incoming.passage_key,
                status: incoming.status,
                page_name: incoming.page_name,
                start_time: incoming.start_time,
                duration_ms,
                server_ts,
            };
            events.push(record.clone());
            ReadingOutcome::Stored(record)
        }
    }
}

/// Record an event against an in-memory list using the current clock
pub fn record_event(events: &mut Vec<ReadingEvent>, incoming: IncomingEvent) -> ReadingOutcome {
    apply_to_events(events, incoming, time::now_ms())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incoming(
        passage: &str,
        status: VisibilityStatus,
        page: &str,
        start: i64,
        duration: i64,
    ) -> IncomingEvent {
        IncomingEvent {
            passage_key: passage.to_string(),
            status,
            page_name: page.to_string(),
            start_time: start,
            duration_ms: duration,
        }
    }

    #[test]
    fn test_leading_spurious_blur_is_suppressed() {
        let mut events = Vec::new();
        let outcome = apply_to_events(
            &mut events,
            incoming("p1", VisibilityStatus::Blur, UNKNOWN_PAGE, 1_000, 100),
            9_999,
        );
        assert_eq!(
            outcome,
            ReadingOutcome::Suppressed {
                reason: SuppressReason::LeadingSpuriousBlur
            }
        );
        assert!(events.is_empty());

        // The subsequent first active stores normally
        let outcome = apply_to_events(
            &mut events,
            incoming("p1", VisibilityStatus::Active, "passage", 1_100, 5_000),
            9_999,
        );
        assert!(matches!(outcome, ReadingOutcome::Stored(_)));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_long_leading_blur_is_kept() {
        let mut events = Vec::new();
        let outcome = apply_to_events(
            &mut events,
            incoming("p1", VisibilityStatus::Blur, UNKNOWN_PAGE, 1_000, 5_000),
            0,
        );
        assert!(matches!(outcome, ReadingOutcome::Stored(_)));
    }

    #[test]
    fn test_named_page_blur_is_not_spurious() {
        let mut events = Vec::new();
        let outcome = apply_to_events(
            &mut events,
            incoming("p1", VisibilityStatus::Blur, "passage", 1_000, 100),
            0,
        );
        assert!(matches!(outcome, ReadingOutcome::Stored(_)));
    }

    #[test]
    fn test_first_active_removes_trailing_tiny_blur() {
        let mut events = vec![ReadingEvent {
            passage_key: "p1".to_string(),
            status: VisibilityStatus::Blur,
            page_name: UNKNOWN_PAGE.to_string(),
            start_time: 500,
            duration_ms: 200,
            server_ts: 0,
        }];
        let outcome = apply_to_events(
            &mut events,
            incoming("p1", VisibilityStatus::Active, "passage", 1_000, 2_000),
            0,
        );
        assert!(matches!(outcome, ReadingOutcome::Stored(_)));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, VisibilityStatus::Active);
    }

    #[test]
    fn test_cleanup_only_touches_same_passage() {
        let mut events = vec![ReadingEvent {
            passage_key: "p2".to_string(),
            status: VisibilityStatus::Blur,
            page_name: UNKNOWN_PAGE.to_string(),
            start_time: 500,
            duration_ms: 200,
            server_ts: 0,
        }];
        apply_to_events(
            &mut events,
            incoming("p1", VisibilityStatus::Active, "passage", 1_000, 2_000),
            0,
        );
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].passage_key, "p2");
    }

    #[test]
    fn test_micro_segment_is_discarded() {
        let mut events = Vec::new();
        let outcome = apply_to_events(
            &mut events,
            incoming("p1", VisibilityStatus::Active, "passage", 1_000, 25),
            0,
        );
        assert_eq!(
            outcome,
            ReadingOutcome::Suppressed {
                reason: SuppressReason::MicroSegment
            }
        );
        assert!(events.is_empty());
    }

    #[test]
    fn test_adjacent_same_state_segments_merge() {
        let mut events = Vec::new();
        apply_to_events(
            &mut events,
            incoming("p1", VisibilityStatus::Active, "passage", 1_000, 1_000),
            0,
        );
        // Starts 300ms after the first segment's end
        let outcome = apply_to_events(
            &mut events,
            incoming("p1", VisibilityStatus::Active, "passage", 2_300, 500),
            0,
        );
        let ReadingOutcome::Merged(merged) = outcome else {
            panic!("expected merge, got {:?}", outcome);
        };
        assert_eq!(events.len(), 1);
        assert_eq!(merged.duration_ms, 1_800); // 1000 + gap 300 + 500
        assert_eq!(merged.start_time, 1_000);
    }

    #[test]
    fn test_gap_beyond_tolerance_appends() {
        let mut events = Vec::new();
        apply_to_events(
            &mut events,
            incoming("p1", VisibilityStatus::Active, "passage", 1_000, 1_000),
            0,
        );
        let outcome = apply_to_events(
            &mut events,
            incoming("p1", VisibilityStatus::Active, "passage", 3_000, 500),
            0,
        );
        assert!(matches!(outcome, ReadingOutcome::Stored(_)));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_different_page_does_not_merge() {
        let mut events = Vec::new();
        apply_to_events(
            &mut events,
            incoming("p1", VisibilityStatus::Active, "passage", 1_000, 1_000),
            0,
        );
        let outcome = apply_to_events(
            &mut events,
            incoming("p1", VisibilityStatus::Active, "questions", 2_100, 500),
            0,
        );
        assert!(matches!(outcome, ReadingOutcome::Stored(_)));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_overlapping_retry_never_shrinks_segment() {
        let mut events = Vec::new();
        apply_to_events(
            &mut events,
            incoming("p1", VisibilityStatus::Active, "passage", 1_000, 2_000),
            0,
        );
        // Retry overlapping the stored segment, ending earlier
        let outcome = apply_to_events(
            &mut events,
            incoming("p1", VisibilityStatus::Active, "passage", 1_500, 500),
            0,
        );
        assert!(matches!(outcome, ReadingOutcome::Merged(_)));
        assert_eq!(events[0].duration_ms, 2_000);
    }

    #[test]
    fn test_duration_is_clamped_to_ceiling() {
        let mut events = Vec::new();
        let outcome = apply_to_events(
            &mut events,
            incoming(
                "p1",
                VisibilityStatus::Active,
                "passage",
                1_000,
                MAX_SEGMENT_MS + 60_000,
            ),
            0,
        );
        let ReadingOutcome::Stored(stored) = outcome else {
            panic!("expected store");
        };
        assert_eq!(stored.duration_ms, MAX_SEGMENT_MS);
    }

    #[test]
    fn test_sanitize_coerces_raw_fields() {
        let ev = IncomingEvent::sanitized("p1", VisibilityStatus::Blur, None, 10, -50);
        assert_eq!(ev.page_name, UNKNOWN_PAGE);
        assert_eq!(ev.duration_ms, 0);
        let ev = IncomingEvent::sanitized("p1", VisibilityStatus::Active, Some("  "), 10, 99);
        assert_eq!(ev.page_name, UNKNOWN_PAGE);
        assert_eq!(ev.duration_ms, 99);
    }
}

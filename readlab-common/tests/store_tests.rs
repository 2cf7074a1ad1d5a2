//! Backend-parity tests for the session store
//!
//! Every behavior is exercised against both the in-memory and the SQLite
//! backend through the `StudyStore` trait, so the two stay interchangeable.

use readlab_common::attention::AttentionOutcome;
use readlab_common::content::{Catalog, Variant};
use readlab_common::demographics::Demographics;
use readlab_common::randomize::randomize_session;
use readlab_common::reading::{
    IncomingEvent, ReadingOutcome, SuppressReason, VisibilityStatus, UNKNOWN_PAGE,
};
use readlab_common::store::{
    FinalCheck, McqSubmission, MemoryStore, SqliteStore, StudyStore, VocabAnswer,
};
use readlab_common::Error;
use std::collections::BTreeMap;

async fn memory_store() -> Box<dyn StudyStore> {
    Box::new(MemoryStore::new())
}

async fn sqlite_store(dir: &tempfile::TempDir) -> Box<dyn StudyStore> {
    Box::new(
        SqliteStore::connect(&dir.path().join("study.db"))
            .await
            .expect("sqlite store should open"),
    )
}

/// Run one scenario against both backends
macro_rules! on_both_backends {
    ($body:expr) => {{
        let store = memory_store().await;
        ($body)(store).await;

        let dir = tempfile::tempdir().unwrap();
        let store = sqlite_store(&dir).await;
        ($body)(store).await;
    }};
}

fn submission(score: u32) -> McqSubmission {
    McqSubmission {
        passage_uid: "sample_1_1".to_string(),
        source: Variant::Baseline,
        per_question: Vec::new(),
        score,
        time_on_questions_ms: Some(42_000),
        back_to_passage_clicks: 1,
        submitted_at_ms: 1_700_000_000_000,
    }
}

fn event(passage: &str, status: VisibilityStatus, page: &str, start: i64, dur: i64) -> IncomingEvent {
    IncomingEvent {
        passage_key: passage.to_string(),
        status,
        page_name: page.to_string(),
        start_time: start,
        duration_ms: dur,
    }
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    on_both_backends!(|store: Box<dyn StudyStore>| async move {
        assert!(matches!(
            store.session("ghost").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            store.assignment("ghost").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            store.add_attention_time("ghost", "consent", 100).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            store
                .record_reading_event(
                    "ghost",
                    event("p1", VisibilityStatus::Active, "passage", 0, 1_000)
                )
                .await,
            Err(Error::NotFound(_))
        ));
    });
}

#[tokio::test]
async fn test_session_lifecycle_and_profile() {
    on_both_backends!(|store: Box<dyn StudyStore>| async move {
        store
            .start_session("s1", Some("prolific".to_string()))
            .await
            .unwrap();
        let record = store.session("s1").await.unwrap();
        assert_eq!(record.session_id, "s1");
        assert_eq!(record.source.as_deref(), Some("prolific"));
        assert!(record.consent);
        assert!(record.final_check.is_none());

        store
            .record_final_check(
                "s1",
                FinalCheck {
                    used_ai_tools: Some("No".to_string()),
                    tools: Vec::new(),
                    other_tool: String::new(),
                    server_ts: 123,
                },
            )
            .await
            .unwrap();
        let record = store.session("s1").await.unwrap();
        assert_eq!(
            record.final_check.unwrap().used_ai_tools.as_deref(),
            Some("No")
        );
    });
}

#[tokio::test]
async fn test_assignment_roundtrip_and_source_lookup() {
    on_both_backends!(|store: Box<dyn StudyStore>| async move {
        let catalog = Catalog::sample();
        store.start_session("s1", None).await.unwrap();
        let assignment = randomize_session(&catalog, "s1").unwrap();
        store.set_assignment("s1", &assignment).await.unwrap();

        let loaded = store.assignment("s1").await.unwrap().unwrap();
        assert_eq!(loaded, assignment);

        for key in &assignment.passage_keys {
            let source = store.source_for("s1", key).await.unwrap();
            assert_eq!(source, assignment.source_for(key));
        }
        assert_eq!(store.source_for("s1", "p99").await.unwrap(), None);
    });
}

#[tokio::test]
async fn test_mcq_resubmission_overwrites() {
    on_both_backends!(|store: Box<dyn StudyStore>| async move {
        store.start_session("s1", None).await.unwrap();
        store
            .save_mcq_submission("s1", "p1", &submission(2))
            .await
            .unwrap();
        store
            .save_mcq_submission("s1", "p1", &submission(5))
            .await
            .unwrap();
        let loaded = store.mcq_submission("s1", "p1").await.unwrap().unwrap();
        assert_eq!(loaded.score, 5);
        assert!(store.mcq_submission("s1", "p2").await.unwrap().is_none());
    });
}

#[tokio::test]
async fn test_posttask_ratings_merge_by_key() {
    on_both_backends!(|store: Box<dyn StudyStore>| async move {
        store.start_session("s1", None).await.unwrap();
        let first: BTreeMap<String, i64> =
            [("q1".to_string(), 1), ("q2".to_string(), -1)].into();
        store
            .merge_posttask_ratings("s1", "sample_1_1", &first)
            .await
            .unwrap();
        let second: BTreeMap<String, i64> =
            [("q2".to_string(), 1), ("q3".to_string(), -1)].into();
        store
            .merge_posttask_ratings("s1", "sample_1_1", &second)
            .await
            .unwrap();

        let merged = store.posttask_ratings("s1", "sample_1_1").await.unwrap();
        assert_eq!(merged.len(), 3);
        assert_eq!(merged["q1"], 1);
        assert_eq!(merged["q2"], 1); // updated, not dropped
        assert_eq!(merged["q3"], -1);
    });
}

#[tokio::test]
async fn test_vocab_index_tracks_answer_count() {
    on_both_backends!(|store: Box<dyn StudyStore>| async move {
        store.start_session("s1", None).await.unwrap();
        store.init_vocab("s1", 60).await.unwrap();

        let progress = store.vocab_progress("s1").await.unwrap();
        assert_eq!(progress.index, 0);
        assert_eq!(progress.size, 60);

        for i in 0..3 {
            store
                .advance_vocab(
                    "s1",
                    VocabAnswer {
                        item_id: format!("v{:02}", i + 1),
                        is_word: i % 2 == 0,
                        rt_ms: Some(480 + i),
                        ts_ms: 1_000 + i,
                    },
                )
                .await
                .unwrap();
            let progress = store.vocab_progress("s1").await.unwrap();
            assert_eq!(progress.index, (i + 1) as usize);
            assert_eq!(progress.index, progress.answers.len());
        }
    });
}

#[tokio::test]
async fn test_attention_accumulation_rules() {
    on_both_backends!(|store: Box<dyn StudyStore>| async move {
        store.start_session("s1", None).await.unwrap();

        for (elapsed, expected_total) in [(100, 100), (200, 300), (300, 600)] {
            let outcome = store
                .add_attention_time("s1", "reading_task1", elapsed)
                .await
                .unwrap();
            assert_eq!(
                outcome,
                AttentionOutcome::Recorded {
                    bucket: "reading_task1".to_string(),
                    total_ms: expected_total
                }
            );
        }

        // Negative increments coerce to zero
        let outcome = store
            .add_attention_time("s1", "reading_task1", -50)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            AttentionOutcome::Recorded {
                bucket: "reading_task1".to_string(),
                total_ms: 600
            }
        );

        // Unknown buckets are ignored and never created
        let outcome = store
            .add_attention_time("s1", "reading_task9", 1_000)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            AttentionOutcome::Ignored {
                bucket: "reading_task9".to_string()
            }
        );
        let totals = store.attention_totals("s1").await.unwrap();
        assert!(!totals.contains_key("reading_task9"));
        assert_eq!(totals["reading_task1"], 600);
        assert_eq!(totals["consent"], 0);
    });
}

#[tokio::test]
async fn test_participation_total_clamped_non_negative() {
    on_both_backends!(|store: Box<dyn StudyStore>| async move {
        store.start_session("s1", None).await.unwrap();
        // Client clock behind the server: end before creation clamps to 0
        let total = store.finish_participation("s1", Some(1)).await.unwrap();
        assert_eq!(total.total_participation_ms, 0);

        let record = store.session("s1").await.unwrap();
        assert_eq!(record.participation_end_ms, Some(1));
        assert_eq!(record.total_participation_ms, Some(0));
    });
}

#[tokio::test]
async fn test_reading_event_suppression_through_store() {
    on_both_backends!(|store: Box<dyn StudyStore>| async move {
        store.start_session("s1", None).await.unwrap();

        let outcome = store
            .record_reading_event(
                "s1",
                event("p1", VisibilityStatus::Blur, UNKNOWN_PAGE, 1_000, 100),
            )
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReadingOutcome::Suppressed {
                reason: SuppressReason::LeadingSpuriousBlur
            }
        );

        let outcome = store
            .record_reading_event(
                "s1",
                event("p1", VisibilityStatus::Active, "passage", 1_100, 5_000),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, ReadingOutcome::Stored(_)));

        let events = store.reading_events("s1").await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, VisibilityStatus::Active);
    });
}

#[tokio::test]
async fn test_reading_event_merge_through_store() {
    on_both_backends!(|store: Box<dyn StudyStore>| async move {
        store.start_session("s1", None).await.unwrap();

        store
            .record_reading_event(
                "s1",
                event("p1", VisibilityStatus::Active, "passage", 1_000, 1_000),
            )
            .await
            .unwrap();
        let outcome = store
            .record_reading_event(
                "s1",
                event("p1", VisibilityStatus::Active, "passage", 2_300, 500),
            )
            .await
            .unwrap();

        let ReadingOutcome::Merged(merged) = outcome else {
            panic!("expected merge, got {:?}", outcome);
        };
        assert_eq!(merged.duration_ms, 1_800);

        let events = store.reading_events("s1").await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].duration_ms, 1_800);
    });
}

#[tokio::test]
async fn test_tiny_unknown_blur_after_active_is_kept() {
    on_both_backends!(|store: Box<dyn StudyStore>| async move {
        store.start_session("s1", None).await.unwrap();

        store
            .record_reading_event(
                "s1",
                event("p1", VisibilityStatus::Active, "passage", 1_000, 2_000),
            )
            .await
            .unwrap();
        // Once an active exists, a short unknown-page blur is real signal
        let outcome = store
            .record_reading_event(
                "s1",
                event("p1", VisibilityStatus::Blur, UNKNOWN_PAGE, 3_200, 200),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, ReadingOutcome::Stored(_)));
        assert_eq!(store.reading_events("s1").await.unwrap().len(), 2);
    });
}

#[tokio::test]
async fn test_sqlite_store_survives_reconnect() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("study.db");

    {
        let store = SqliteStore::connect(&path).await.unwrap();
        store.start_session("s1", None).await.unwrap();
        store
            .save_mcq_submission("s1", "p1", &submission(4))
            .await
            .unwrap();
        store
            .add_attention_time("s1", "consent", 1_234)
            .await
            .unwrap();
    }

    let store = SqliteStore::connect(&path).await.unwrap();
    let loaded = store.mcq_submission("s1", "p1").await.unwrap().unwrap();
    assert_eq!(loaded.score, 4);
    assert_eq!(store.attention_totals("s1").await.unwrap()["consent"], 1_234);

    let demo = Demographics::default();
    store.save_demographics("s1", &demo).await.unwrap();
    assert_eq!(store.demographics("s1").await.unwrap(), Some(demo));
}

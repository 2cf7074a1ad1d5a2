//! Session state storage
//!
//! One keyed, durable-from-the-caller's-perspective store per deployment,
//! behind the `StudyStore` trait: point reads/writes per session plus atomic
//! accumulate (attention time) and append-with-reconciliation (reading
//! events). Two implementations, selected by configuration:
//!
//! - `MemoryStore`: process-lifetime maps for dev and tests
//! - `SqliteStore`: durable SQLite store for production
//!
//! Every operation addressed by session id verifies the session exists and
//! returns `Error::NotFound` otherwise, before any other validation.
//! Per-entity writes are idempotent-by-overwrite (resubmitting MCQ answers
//! replaces the prior record); vocabulary answers and reading events are
//! append-only logs.

pub mod memory;
#[cfg(feature = "sqlx")]
pub mod sqlite;

pub use memory::MemoryStore;
#[cfg(feature = "sqlx")]
pub use sqlite::SqliteStore;

use crate::attention::AttentionOutcome;
use crate::content::Variant;
use crate::demographics::Demographics;
use crate::grading::QuestionResult;
use crate::randomize::SessionAssignment;
use crate::reading::{IncomingEvent, ReadingEvent, ReadingOutcome};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-session profile record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub created_at_ms: i64,
    /// Recruitment source tag (e.g. "prolific"), if the client sent one
    pub source: Option<String>,
    pub consent: bool,
    pub participation_end_ms: Option<i64>,
    pub total_participation_ms: Option<i64>,
    pub final_check: Option<FinalCheck>,
}

/// Final self-report about external tool usage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalCheck {
    pub used_ai_tools: Option<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub other_tool: String,
    pub server_ts: i64,
}

/// One graded MCQ submission for a (session, passage) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McqSubmission {
    /// Stable content id of the passage (not the catalog key)
    pub passage_uid: String,
    pub source: Variant,
    pub per_question: Vec<QuestionResult>,
    pub score: u32,
    pub time_on_questions_ms: Option<i64>,
    pub back_to_passage_clicks: i64,
    pub submitted_at_ms: i64,
}

/// One answer in the vocabulary recognition task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabAnswer {
    pub item_id: String,
    pub is_word: bool,
    pub rt_ms: Option<i64>,
    pub ts_ms: i64,
}

/// Vocabulary task progress; index always equals answers.len()
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VocabProgress {
    pub index: usize,
    pub answers: Vec<VocabAnswer>,
    pub size: usize,
}

/// Computed participation total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipationTotal {
    pub end_ms: i64,
    /// End minus creation, clamped non-negative
    pub total_participation_ms: i64,
}

/// The storage contract every backend satisfies
#[async_trait]
pub trait StudyStore: Send + Sync {
    /// Create the session record; overwrites any prior record for the id
    async fn start_session(&self, session_id: &str, source: Option<String>) -> Result<()>;

    /// Read the session profile; NotFound for unknown ids
    async fn session(&self, session_id: &str) -> Result<SessionRecord>;

    async fn save_demographics(&self, session_id: &str, demographics: &Demographics)
        -> Result<()>;
    async fn demographics(&self, session_id: &str) -> Result<Option<Demographics>>;

    /// Persist the randomization outcome; immutable in intent, but a rerun
    /// of the same deterministic randomization writes identical values
    async fn set_assignment(&self, session_id: &str, assignment: &SessionAssignment)
        -> Result<()>;
    async fn assignment(&self, session_id: &str) -> Result<Option<SessionAssignment>>;

    /// Variant assigned to one passage, if the session was randomized
    async fn source_for(&self, session_id: &str, passage_key: &str) -> Result<Option<Variant>>;

    /// Save a graded submission; resubmission overwrites
    async fn save_mcq_submission(
        &self,
        session_id: &str,
        passage_key: &str,
        submission: &McqSubmission,
    ) -> Result<()>;
    async fn mcq_submission(
        &self,
        session_id: &str,
        passage_key: &str,
    ) -> Result<Option<McqSubmission>>;

    /// Merge ratings by question id; ratings arrive incrementally so this
    /// must never replace the whole record
    async fn merge_posttask_ratings(
        &self,
        session_id: &str,
        passage_uid: &str,
        ratings: &BTreeMap<String, i64>,
    ) -> Result<()>;
    async fn posttask_ratings(
        &self,
        session_id: &str,
        passage_uid: &str,
    ) -> Result<BTreeMap<String, i64>>;

    async fn init_vocab(&self, session_id: &str, size: usize) -> Result<()>;
    async fn vocab_progress(&self, session_id: &str) -> Result<VocabProgress>;

    /// Append one answer and advance the index, atomically
    async fn advance_vocab(&self, session_id: &str, answer: VocabAnswer) -> Result<()>;

    async fn record_final_check(&self, session_id: &str, report: FinalCheck) -> Result<()>;

    /// Compute and persist total participation time from session creation
    async fn finish_participation(
        &self,
        session_id: &str,
        finished_at_ms: Option<i64>,
    ) -> Result<ParticipationTotal>;

    /// Accumulate focused time into one attention bucket (closed set;
    /// unknown buckets are ignored, increments clamped)
    async fn add_attention_time(
        &self,
        session_id: &str,
        bucket: &str,
        elapsed_ms: i64,
    ) -> Result<AttentionOutcome>;
    async fn attention_totals(&self, session_id: &str) -> Result<BTreeMap<String, i64>>;

    /// Append one reading event, applying the reconciliation rules
    async fn record_reading_event(
        &self,
        session_id: &str,
        incoming: IncomingEvent,
    ) -> Result<ReadingOutcome>;
    async fn reading_events(&self, session_id: &str) -> Result<Vec<ReadingEvent>>;
}

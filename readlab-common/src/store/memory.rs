//! In-memory session store
//!
//! Process-lifetime maps, one entry per session. All state for a session
//! lives under one lock-guarded record, so each operation observes and
//! mutates a consistent per-session snapshot.

use super::{
    FinalCheck, McqSubmission, ParticipationTotal, SessionRecord, StudyStore, VocabAnswer,
    VocabProgress,
};
use crate::attention::{self, AttentionOutcome};
use crate::content::Variant;
use crate::demographics::Demographics;
use crate::randomize::SessionAssignment;
use crate::reading::{self, IncomingEvent, ReadingEvent, ReadingOutcome};
use crate::{time, Error, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct SessionState {
    record: Option<SessionRecord>,
    demographics: Option<Demographics>,
    assignment: Option<SessionAssignment>,
    mcq: HashMap<String, McqSubmission>,
    /// passage_uid -> question_id -> rating
    posttask: HashMap<String, BTreeMap<String, i64>>,
    vocab: Option<VocabProgress>,
    attention: BTreeMap<String, i64>,
    events: Vec<ReadingEvent>,
}

/// In-memory `StudyStore` implementation
#[derive(Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, SessionState>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    fn not_found(session_id: &str) -> Error {
        Error::session_not_found(session_id)
    }
}

#[async_trait]
impl StudyStore for MemoryStore {
    async fn start_session(&self, session_id: &str, source: Option<String>) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let state = sessions.entry(session_id.to_string()).or_default();
        state.record = Some(SessionRecord {
            session_id: session_id.to_string(),
            created_at_ms: time::now_ms(),
            source,
            consent: true,
            participation_end_ms: None,
            total_participation_ms: None,
            final_check: None,
        });
        state.attention = attention::BUCKETS
            .iter()
            .map(|b| ((*b).to_string(), 0))
            .collect();
        Ok(())
    }

    async fn session(&self, session_id: &str) -> Result<SessionRecord> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .and_then(|s| s.record.clone())
            .ok_or_else(|| Self::not_found(session_id))
    }

    async fn save_demographics(
        &self,
        session_id: &str,
        demographics: &Demographics,
    ) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let state = sessions
            .get_mut(session_id)
            .filter(|s| s.record.is_some())
            .ok_or_else(|| Self::not_found(session_id))?;
        state.demographics = Some(demographics.clone());
        Ok(())
    }

    async fn demographics(&self, session_id: &str) -> Result<Option<Demographics>> {
        let sessions = self.sessions.read().await;
        let state = sessions
            .get(session_id)
            .filter(|s| s.record.is_some())
            .ok_or_else(|| Self::not_found(session_id))?;
        Ok(state.demographics.clone())
    }

    async fn set_assignment(
        &self,
        session_id: &str,
        assignment: &SessionAssignment,
    ) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let state = sessions
            .get_mut(session_id)
            .filter(|s| s.record.is_some())
            .ok_or_else(|| Self::not_found(session_id))?;
        state.assignment = Some(assignment.clone());
        Ok(())
    }

    async fn assignment(&self, session_id: &str) -> Result<Option<SessionAssignment>> {
        let sessions = self.sessions.read().await;
        let state = sessions
            .get(session_id)
            .filter(|s| s.record.is_some())
            .ok_or_else(|| Self::not_found(session_id))?;
        Ok(state.assignment.clone())
    }

    async fn source_for(&self, session_id: &str, passage_key: &str) -> Result<Option<Variant>> {
        Ok(self
            .assignment(session_id)
            .await?
            .and_then(|a| a.source_for(passage_key)))
    }

    async fn save_mcq_submission(
        &self,
        session_id: &str,
        passage_key: &str,
        submission: &McqSubmission,
    ) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let state = sessions
            .get_mut(session_id)
            .filter(|s| s.record.is_some())
            .ok_or_else(|| Self::not_found(session_id))?;
        state
            .mcq
            .insert(passage_key.to_string(), submission.clone());
        Ok(())
    }

    async fn mcq_submission(
        &self,
        session_id: &str,
        passage_key: &str,
    ) -> Result<Option<McqSubmission>> {
        let sessions = self.sessions.read().await;
        let state = sessions
            .get(session_id)
            .filter(|s| s.record.is_some())
            .ok_or_else(|| Self::not_found(session_id))?;
        Ok(state.mcq.get(passage_key).cloned())
    }

    async fn merge_posttask_ratings(
        &self,
        session_id: &str,
        passage_uid: &str,
        ratings: &BTreeMap<String, i64>,
    ) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let state = sessions
            .get_mut(session_id)
            .filter(|s| s.record.is_some())
            .ok_or_else(|| Self::not_found(session_id))?;
        let entry = state.posttask.entry(passage_uid.to_string()).or_default();
        for (question_id, rating) in ratings {
            entry.insert(question_id.clone(), *rating);
        }
        Ok(())
    }

    async fn posttask_ratings(
        &self,
        session_id: &str,
        passage_uid: &str,
    ) -> Result<BTreeMap<String, i64>> {
        let sessions = self.sessions.read().await;
        let state = sessions
            .get(session_id)
            .filter(|s| s.record.is_some())
            .ok_or_else(|| Self::not_found(session_id))?;
        Ok(state.posttask.get(passage_uid).cloned().unwrap_or_default())
    }

    async fn init_vocab(&self, session_id: &str, size: usize) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let state = sessions
            .get_mut(session_id)
            .filter(|s| s.record.is_some())
            .ok_or_else(|| Self::not_found(session_id))?;
        state.vocab = Some(VocabProgress {
            index: 0,
            answers: Vec::new(),
            size,
        });
        Ok(())
    }

    async fn vocab_progress(&self, session_id: &str) -> Result<VocabProgress> {
        let sessions = self.sessions.read().await;
        let state = sessions
            .get(session_id)
            .filter(|s| s.record.is_some())
            .ok_or_else(|| Self::not_found(session_id))?;
        Ok(state.vocab.clone().unwrap_or_default())
    }

    async fn advance_vocab(&self, session_id: &str, answer: VocabAnswer) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let state = sessions
            .get_mut(session_id)
            .filter(|s| s.record.is_some())
            .ok_or_else(|| Self::not_found(session_id))?;
        let progress = state.vocab.get_or_insert_with(VocabProgress::default);
        progress.answers.push(answer);
        progress.index = progress.answers.len();
        Ok(())
    }

    async fn record_final_check(&self, session_id: &str, report: FinalCheck) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let record = sessions
            .get_mut(session_id)
            .and_then(|s| s.record.as_mut())
            .ok_or_else(|| Self::not_found(session_id))?;
        record.final_check = Some(report);
        Ok(())
    }

    async fn finish_participation(
        &self,
        session_id: &str,
        finished_at_ms: Option<i64>,
    ) -> Result<ParticipationTotal> {
        let mut sessions = self.sessions.write().await;
        let record = sessions
            .get_mut(session_id)
            .and_then(|s| s.record.as_mut())
            .ok_or_else(|| Self::not_found(session_id))?;
        let end_ms = finished_at_ms.unwrap_or_else(time::now_ms);
        let total = (end_ms - record.created_at_ms).max(0);
        record.participation_end_ms = Some(end_ms);
        record.total_participation_ms = Some(total);
        Ok(ParticipationTotal {
            end_ms,
            total_participation_ms: total,
        })
    }

    async fn add_attention_time(
        &self,
        session_id: &str,
        bucket: &str,
        elapsed_ms: i64,
    ) -> Result<AttentionOutcome> {
        let mut sessions = self.sessions.write().await;
        let state = sessions
            .get_mut(session_id)
            .filter(|s| s.record.is_some())
            .ok_or_else(|| Self::not_found(session_id))?;
        if !attention::is_known_bucket(bucket) {
            return Ok(AttentionOutcome::Ignored {
                bucket: bucket.to_string(),
            });
        }
        let total = state.attention.entry(bucket.to_string()).or_insert(0);
        *total += attention::clamp_elapsed(elapsed_ms);
        Ok(AttentionOutcome::Recorded {
            bucket: bucket.to_string(),
            total_ms: *total,
        })
    }

    async fn attention_totals(&self, session_id: &str) -> Result<BTreeMap<String, i64>> {
        let sessions = self.sessions.read().await;
        let state = sessions
            .get(session_id)
            .filter(|s| s.record.is_some())
            .ok_or_else(|| Self::not_found(session_id))?;
        Ok(state.attention.clone())
    }

    async fn record_reading_event(
        &self,
        session_id: &str,
        incoming: IncomingEvent,
    ) -> Result<ReadingOutcome> {
        let mut sessions = self.sessions.write().await;
        let state = sessions
            .get_mut(session_id)
            .filter(|s| s.record.is_some())
            .ok_or_else(|| Self::not_found(session_id))?;
        Ok(reading::record_event(&mut state.events, incoming))
    }

    async fn reading_events(&self, session_id: &str) -> Result<Vec<ReadingEvent>> {
        let sessions = self.sessions.read().await;
        let state = sessions
            .get(session_id)
            .filter(|s| s.record.is_some())
            .ok_or_else(|| Self::not_found(session_id))?;
        Ok(state.events.clone())
    }
}

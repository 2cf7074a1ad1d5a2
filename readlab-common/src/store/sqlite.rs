//! SQLite session store
//!
//! Durable `StudyStore` backend. Schema creation is idempotent and runs at
//! connect time. Per-session mutations that read-modify-write (vocabulary
//! advance, reading-event reconciliation) run inside a transaction; the
//! attention accumulator uses an atomic upsert increment so unrelated
//! sessions never serialize against each other.

use super::{
    FinalCheck, McqSubmission, ParticipationTotal, SessionRecord, StudyStore, VocabAnswer,
    VocabProgress,
};
use crate::attention::{self, AttentionOutcome};
use crate::content::Variant;
use crate::demographics::Demographics;
use crate::randomize::SessionAssignment;
use crate::reading::{
    reconcile, IncomingEvent, ReadingEvent, ReadingOutcome, ReconcileAction, ReconcileContext,
    VisibilityStatus,
};
use crate::{time, Error, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// SQLite-backed `StudyStore` implementation
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the study database and initialize the schema
    pub async fn connect(db_path: &Path) -> Result<SqliteStore> {
        let newly_created = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect(&db_url)
            .await?;

        if newly_created {
            info!("Initialized new study database: {}", db_path.display());
        } else {
            info!("Opened existing study database: {}", db_path.display());
        }

        sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
        // WAL allows concurrent readers with one writer
        sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
        sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

        let store = SqliteStore { pool };
        store.create_schema().await?;
        Ok(store)
    }

    async fn create_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                created_at_ms INTEGER NOT NULL,
                source TEXT,
                consent INTEGER NOT NULL DEFAULT 1,
                participation_end_ms INTEGER,
                total_participation_ms INTEGER,
                final_check TEXT
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS demographics (
                session_id TEXT PRIMARY KEY,
                payload TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS assignments (
                session_id TEXT PRIMARY KEY,
                payload TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS mcq_responses (
                session_id TEXT NOT NULL,
                passage_key TEXT NOT NULL,
                payload TEXT NOT NULL,
                PRIMARY KEY (session_id, passage_key)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS posttask_ratings (
                session_id TEXT NOT NULL,
                passage_uid TEXT NOT NULL,
                question_id TEXT NOT NULL,
                rating INTEGER NOT NULL,
                PRIMARY KEY (session_id, passage_uid, question_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS vocab_progress (
                session_id TEXT PRIMARY KEY,
                size INTEGER NOT NULL DEFAULT 0
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS vocab_answers (
                session_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                item_id TEXT NOT NULL,
                is_word INTEGER NOT NULL,
                rt_ms INTEGER,
                ts_ms INTEGER NOT NULL,
                PRIMARY KEY (session_id, seq)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS attention_time (
                session_id TEXT NOT NULL,
                bucket TEXT NOT NULL,
                total_ms INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (session_id, bucket)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS reading_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                passage_key TEXT NOT NULL,
                status TEXT NOT NULL,
                page_name TEXT NOT NULL,
                start_time INTEGER NOT NULL,
                duration_ms INTEGER NOT NULL,
                server_ts INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_reading_events_session_passage
             ON reading_events (session_id, passage_key)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn require_session(&self, session_id: &str) -> Result<()> {
        let exists: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sessions WHERE session_id = ?)")
                .bind(session_id)
                .fetch_one(&self.pool)
                .await?;
        if exists == 0 {
            return Err(Error::session_not_found(session_id));
        }
        Ok(())
    }

    fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
        serde_json::to_string(value).map_err(|e| Error::Internal(format!("JSON encode: {}", e)))
    }

    fn from_json<T: serde::de::DeserializeOwned>(text: &str) -> Result<T> {
        serde_json::from_str(text).map_err(|e| Error::Internal(format!("JSON decode: {}", e)))
    }
}

#[async_trait]
impl StudyStore for SqliteStore {
    async fn start_session(&self, session_id: &str, source: Option<String>) -> Result<()> {
        let created = time::now_ms();
        sqlx::query(
            "INSERT OR REPLACE INTO sessions
                (session_id, created_at_ms, source, consent)
             VALUES (?, ?, ?, 1)",
        )
        .bind(session_id)
        .bind(created)
        .bind(source)
        .execute(&self.pool)
        .await?;

        // Pre-create the closed bucket set so totals always list every stage
        for bucket in attention::BUCKETS {
            sqlx::query(
                "INSERT OR REPLACE INTO attention_time (session_id, bucket, total_ms)
                 VALUES (?, ?, 0)",
            )
            .bind(session_id)
            .bind(bucket)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn session(&self, session_id: &str) -> Result<SessionRecord> {
        let row: Option<(String, i64, Option<String>, i64, Option<i64>, Option<i64>, Option<String>)> =
            sqlx::query_as(
                "SELECT session_id, created_at_ms, source, consent,
                        participation_end_ms, total_participation_ms, final_check
                 FROM sessions WHERE session_id = ?",
            )
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some((id, created, source, consent, end_ms, total_ms, final_check)) = row else {
            return Err(Error::session_not_found(session_id));
        };
        Ok(SessionRecord {
            session_id: id,
            created_at_ms: created,
            source,
            consent: consent != 0,
            participation_end_ms: end_ms,
            total_participation_ms: total_ms,
            final_check: match final_check {
                Some(text) => Some(Self::from_json(&text)?),
                None => None,
            },
        })
    }

    async fn save_demographics(
        &self,
        session_id: &str,
        demographics: &Demographics,
    ) -> Result<()> {
        self.require_session(session_id).await?;
        sqlx::query("INSERT OR REPLACE INTO demographics (session_id, payload) VALUES (?, ?)")
            .bind(session_id)
            .bind(Self::to_json(demographics)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn demographics(&self, session_id: &str) -> Result<Option<Demographics>> {
        self.require_session(session_id).await?;
        let row: Option<(String,)> =
            sqlx::query_as("SELECT payload FROM demographics WHERE session_id = ?")
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(|(text,)| Self::from_json(&text)).transpose()
    }

    async fn set_assignment(
        &self,
        session_id: &str,
        assignment: &SessionAssignment,
    ) -> Result<()> {
        self.require_session(session_id).await?;
        sqlx::query("INSERT OR REPLACE INTO assignments (session_id, payload) VALUES (?, ?)")
            .bind(session_id)
            .bind(Self::to_json(assignment)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn assignment(&self, session_id: &str) -> Result<Option<SessionAssignment>> {
        self.require_session(session_id).await?;
        let row: Option<(String,)> =
            sqlx::query_as("SELECT payload FROM assignments WHERE session_id = ?")
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(|(text,)| Self::from_json(&text)).transpose()
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
        self.require_session(session_id).await?;
        sqlx::query(
            "INSERT OR REPLACE INTO mcq_responses (session_id, passage_key, payload)
             VALUES (?, ?, ?)",
        )
        .bind(session_id)
        .bind(passage_key)
        .bind(Self::to_json(submission)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mcq_submission(
        &self,
        session_id: &str,
        passage_key: &str,
    ) -> Result<Option<McqSubmission>> {
        self.require_session(session_id).await?;
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT payload FROM mcq_responses WHERE session_id = ? AND passage_key = ?",
        )
        .bind(session_id)
        .bind(passage_key)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|(text,)| Self::from_json(&text)).transpose()
    }

    async fn merge_posttask_ratings(
        &self,
        session_id: &str,
        passage_uid: &str,
        ratings: &BTreeMap<String, i64>,
    ) -> Result<()> {
        self.require_session(session_id).await?;
        let mut tx = self.pool.begin().await?;
        for (question_id, rating) in ratings {
            sqlx::query(
                "INSERT INTO posttask_ratings (session_id, passage_uid, question_id, rating)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT (session_id, passage_uid, question_id)
                 DO UPDATE SET rating = excluded.rating",
            )
            .bind(session_id)
            .bind(passage_uid)
            .bind(question_id)
            .bind(rating)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn posttask_ratings(
        &self,
        session_id: &str,
        passage_uid: &str,
    ) -> Result<BTreeMap<String, i64>> {
        self.require_session(session_id).await?;
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT question_id, rating FROM posttask_ratings
             WHERE session_id = ? AND passage_uid = ?",
        )
        .bind(session_id)
        .bind(passage_uid)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    async fn init_vocab(&self, session_id: &str, size: usize) -> Result<()> {
        self.require_session(session_id).await?;
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT OR REPLACE INTO vocab_progress (session_id, size) VALUES (?, ?)")
            .bind(session_id)
            .bind(size as i64)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM vocab_answers WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn vocab_progress(&self, session_id: &str) -> Result<VocabProgress> {
        self.require_session(session_id).await?;
        let size: Option<(i64,)> =
            sqlx::query_as("SELECT size FROM vocab_progress WHERE session_id = ?")
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await?;
        let rows: Vec<(String, i64, Option<i64>, i64)> = sqlx::query_as(
            "SELECT item_id, is_word, rt_ms, ts_ms FROM vocab_answers
             WHERE session_id = ? ORDER BY seq",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        let answers: Vec<VocabAnswer> = rows
            .into_iter()
            .map(|(item_id, is_word, rt_ms, ts_ms)| VocabAnswer {
                item_id,
                is_word: is_word != 0,
                rt_ms,
                ts_ms,
            })
            .collect();
        Ok(VocabProgress {
            index: answers.len(),
            answers,
            size: size.map(|(s,)| s as usize).unwrap_or(0),
        })
    }

    async fn advance_vocab(&self, session_id: &str, answer: VocabAnswer) -> Result<()> {
        self.require_session(session_id).await?;
        let mut tx = self.pool.begin().await?;
        // seq is the current answer count; append-and-increment in one txn
        let seq: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM vocab_answers WHERE session_id = ?")
                .bind(session_id)
                .fetch_one(&mut *tx)
                .await?;
        sqlx::query(
            "INSERT INTO vocab_answers (session_id, seq, item_id, is_word, rt_ms, ts_ms)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(seq)
        .bind(&answer.item_id)
        .bind(answer.is_word as i64)
        .bind(answer.rt_ms)
        .bind(answer.ts_ms)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn record_final_check(&self, session_id: &str, report: FinalCheck) -> Result<()> {
        self.require_session(session_id).await?;
        sqlx::query("UPDATE sessions SET final_check = ? WHERE session_id = ?")
            .bind(Self::to_json(&report)?)
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn finish_participation(
        &self,
        session_id: &str,
        finished_at_ms: Option<i64>,
    ) -> Result<ParticipationTotal> {
        let created: Option<(i64,)> =
            sqlx::query_as("SELECT created_at_ms FROM sessions WHERE session_id = ?")
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await?;
        let Some((created_at_ms,)) = created else {
            return Err(Error::session_not_found(session_id));
        };

        let end_ms = finished_at_ms.unwrap_or_else(time::now_ms);
        let total = (end_ms - created_at_ms).max(0);
        sqlx::query(
            "UPDATE sessions SET participation_end_ms = ?, total_participation_ms = ?
             WHERE session_id = ?",
        )
        .bind(end_ms)
        .bind(total)
        .bind(session_id)
        .execute(&self.pool)
        .await?;
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
        self.require_session(session_id).await?;
        if !attention::is_known_bucket(bucket) {
            return Ok(AttentionOutcome::Ignored {
                bucket: bucket.to_string(),
            });
        }
        // Atomic increment; unrelated sessions never contend on a lock here
        let total_ms: i64 = sqlx::query_scalar(
            "INSERT INTO attention_time (session_id, bucket, total_ms)
             VALUES (?, ?, ?)
             ON CONFLICT (session_id, bucket)
             DO UPDATE SET total_ms = total_ms + excluded.total_ms
             RETURNING total_ms",
        )
        .bind(session_id)
        .bind(bucket)
        .bind(attention::clamp_elapsed(elapsed_ms))
        .fetch_one(&self.pool)
        .await?;
        Ok(AttentionOutcome::Recorded {
            bucket: bucket.to_string(),
            total_ms,
        })
    }

    async fn attention_totals(&self, session_id: &str) -> Result<BTreeMap<String, i64>> {
        self.require_session(session_id).await?;
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT bucket, total_ms FROM attention_time WHERE session_id = ?")
                .bind(session_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    async fn record_reading_event(
        &self,
        session_id: &str,
        incoming: IncomingEvent,
    ) -> Result<ReadingOutcome> {
        self.require_session(session_id).await?;
        let server_ts = time::now_ms();
        let mut tx = self.pool.begin().await?;

        let has_active: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM reading_events
             WHERE session_id = ? AND passage_key = ? AND status = 'active')",
        )
        .bind(session_id)
        .bind(&incoming.passage_key)
        .fetch_one(&mut *tx)
        .await?;

        let last_row: Option<(i64, String, String, i64, i64, i64)> = sqlx::query_as(
            "SELECT id, status, page_name, start_time, duration_ms, server_ts
             FROM reading_events
             WHERE session_id = ? AND passage_key = ?
             ORDER BY id DESC LIMIT 1",
        )
        .bind(session_id)
        .bind(&incoming.passage_key)
        .fetch_optional(&mut *tx)
        .await?;

        let last_id = last_row.as_ref().map(|r| r.0);
        let ctx = ReconcileContext {
            has_active: has_active != 0,
            last_for_passage: last_row.map(|(_, status, page_name, start_time, duration_ms, ts)| {
                ReadingEvent {
                    passage_key: incoming.passage_key.clone(),
                    status: VisibilityStatus::parse_lenient(&status),
                    page_name,
                    start_time,
                    duration_ms,
                    server_ts: ts,
                }
            }),
        };

        let decision = reconcile(&ctx, &incoming);

        if decision.drop_last {
            if let Some(id) = last_id {
                sqlx::query("DELETE FROM reading_events WHERE id = ?")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        let outcome = match decision.action {
            ReconcileAction::Suppress(reason) => ReadingOutcome::Suppressed { reason },
            ReconcileAction::Merge { new_duration_ms } => {
                let id = last_id.ok_or_else(|| {
                    Error::Internal("merge decision without stored segment".to_string())
                })?;
                sqlx::query("UPDATE reading_events SET duration_ms = ?, server_ts = ? WHERE id = ?")
                    .bind(new_duration_ms)
                    .bind(server_ts)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                let mut merged = ctx
                    .last_for_passage
                    .ok_or_else(|| Error::Internal("merge without context".to_string()))?;
                merged.duration_ms = new_duration_ms;
                merged.server_ts = server_ts;
                ReadingOutcome::Merged(merged)
            }
            ReconcileAction::Append { duration_ms } => {
                let record = ReadingEvent {
                    passage_key: incoming.passage_key.clone(),
                    status: incoming.status,
                    page_name: incoming.page_name.clone(),
                    start_time: incoming.start_time,
                    duration_ms,
                    server_ts,
                };
                sqlx::query(
                    "INSERT INTO reading_events
                        (session_id, passage_key, status, page_name, start_time, duration_ms, server_ts)
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(session_id)
                .bind(&record.passage_key)
                .bind(record.status.as_str())
                .bind(&record.page_name)
                .bind(record.start_time)
                .bind(record.duration_ms)
                .bind(record.server_ts)
                .execute(&mut *tx)
                .await?;
                ReadingOutcome::Stored(record)
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn reading_events(&self, session_id: &str) -> Result<Vec<ReadingEvent>> {
        self.require_session(session_id).await?;
        let rows: Vec<(String, String, String, i64, i64, i64)> = sqlx::query_as(
            "SELECT passage_key, status, page_name, start_time, duration_ms, server_ts
             FROM reading_events WHERE session_id = ? ORDER BY id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(
                |(passage_key, status, page_name, start_time, duration_ms, server_ts)| {
                    ReadingEvent {
                        passage_key,
                        status: VisibilityStatus::parse_lenient(&status),
                        page_name,
                        start_time,
                        duration_ms,
                        server_ts,
                    }
                },
            )
            .collect())
    }
}

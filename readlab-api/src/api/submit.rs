//! MCQ submission grading and post-task rating collection

use axum::extract::{Query, State};
use axum::Json;
use readlab_common::grading::{grade, QuestionResult};
use readlab_common::store::McqSubmission;
use readlab_common::{time, Error};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

use crate::api::session::SessionQuery;
use crate::api::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct McqRequest {
    pub passage_id: String,
    #[serde(default)]
    pub answers: HashMap<String, String>,
    #[serde(default)]
    pub time_on_questions_ms: Option<i64>,
    #[serde(default)]
    pub back_to_passage_clicks: i64,
}

#[derive(Debug, Serialize)]
pub struct McqResponse {
    pub passage_id: String,
    pub per_question: Vec<QuestionResult>,
    pub score: u32,
}

/// POST /api/submit_mcq?session_id=...
///
/// Grades the answers against the question set for the variant assigned to
/// this passage and persists the result. Resubmission overwrites.
pub async fn submit_mcq(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    Json(req): Json<McqRequest>,
) -> Result<Json<McqResponse>, ApiError> {
    state.store.session(&query.session_id).await?;

    let source = state
        .store
        .source_for(&query.session_id, &req.passage_id)
        .await?
        .ok_or_else(|| {
            Error::InvalidInput("Source not assigned for this passage.".to_string())
        })?;

    let passage = state.catalog.passage(&req.passage_id)?;
    let qset = state.catalog.question_set(&req.passage_id, source)?;

    let outcome = grade(&req.answers, qset);
    if outcome.skipped_unknown > 0 {
        warn!(
            "Session {}: {} submitted answer(s) referenced unknown question ids on passage {}",
            query.session_id, outcome.skipped_unknown, req.passage_id
        );
    }

    let submission = McqSubmission {
        passage_uid: passage.id.clone(),
        source,
        per_question: outcome.per_question.clone(),
        score: outcome.score,
        time_on_questions_ms: req.time_on_questions_ms,
        back_to_passage_clicks: req.back_to_passage_clicks,
        submitted_at_ms: time::now_ms(),
    };
    state
        .store
        .save_mcq_submission(&query.session_id, &req.passage_id, &submission)
        .await?;

    info!(
        "Session {}: graded passage {} ({} / {} answered)",
        query.session_id,
        req.passage_id,
        outcome.score,
        outcome.per_question.len()
    );

    Ok(Json(McqResponse {
        passage_id: req.passage_id,
        per_question: outcome.per_question,
        score: outcome.score,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PostTaskRequest {
    pub passage_id: String,
    #[serde(default)]
    pub ratings: BTreeMap<String, i64>,
}

/// POST /api/posttask?session_id=...
///
/// Ratings arrive incrementally (one per question view), so they merge into
/// any previously stored ratings for the passage instead of replacing them.
pub async fn posttask_feedback(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    Json(req): Json<PostTaskRequest>,
) -> Result<Json<Value>, ApiError> {
    state.store.session(&query.session_id).await?;

    let passage = state.catalog.passage(&req.passage_id)?;
    state
        .store
        .merge_posttask_ratings(&query.session_id, &passage.id, &req.ratings)
        .await?;

    Ok(Json(json!({ "ok": true })))
}

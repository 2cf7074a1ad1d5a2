//! Vocabulary recognition task endpoints
//!
//! The task is a fixed-order walk through the catalog's vocabulary list.
//! Progress lives server-side so a reloaded client resumes where it left
//! off instead of restarting the list.

use axum::extract::{Query, State};
use axum::Json;
use readlab_common::store::VocabAnswer;
use readlab_common::time;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::session::SessionQuery;
use crate::api::ApiError;
use crate::AppState;

/// POST /api/vocab/start?session_id=...
pub async fn vocab_start(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<Value>, ApiError> {
    state.store.session(&query.session_id).await?;
    let total = state.catalog.vocab.len();
    state.store.init_vocab(&query.session_id, total).await?;
    Ok(Json(json!({ "ok": true, "total": total })))
}

/// The next item as served to the client; correctness stays server-side
#[derive(Debug, Serialize)]
pub struct VocabItemOut {
    pub id: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct VocabNextResponse {
    pub done: bool,
    pub remaining: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<VocabItemOut>,
}

/// GET /api/vocab/next?session_id=...
pub async fn vocab_next(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<VocabNextResponse>, ApiError> {
    let progress = state.store.vocab_progress(&query.session_id).await?;

    let Some(item) = state.catalog.vocab.get(progress.index) else {
        return Ok(Json(VocabNextResponse {
            done: true,
            remaining: 0,
            item: None,
        }));
    };

    Ok(Json(VocabNextResponse {
        done: false,
        remaining: state.catalog.vocab.len() - progress.index,
        item: Some(VocabItemOut {
            id: item.id.clone(),
            token: item.token.clone(),
        }),
    }))
}

#[derive(Debug, Deserialize)]
pub struct VocabAnswerRequest {
    pub item_id: String,
    pub is_word: bool,
    #[serde(default)]
    pub rt_ms: Option<i64>,
}

/// POST /api/vocab/answer?session_id=...
///
/// Appends one answer and advances the cursor. The response discloses
/// correctness for immediate feedback.
pub async fn vocab_answer(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    Json(req): Json<VocabAnswerRequest>,
) -> Result<Json<Value>, ApiError> {
    state.store.session(&query.session_id).await?;
    let item = state.catalog.vocab_item(&req.item_id)?;
    let correct = req.is_word == item.is_word;

    state
        .store
        .advance_vocab(
            &query.session_id,
            VocabAnswer {
                item_id: req.item_id,
                is_word: req.is_word,
                rt_ms: req.rt_ms,
                ts_ms: time::now_ms(),
            },
        )
        .await?;

    Ok(Json(json!({ "ok": true, "correct": correct })))
}

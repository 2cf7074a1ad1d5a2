//! Session lifecycle endpoints: start, demographics, final check,
//! participation-end logging

use axum::extract::{Query, State};
use axum::Json;
use readlab_common::demographics::normalize_demographics;
use readlab_common::store::FinalCheck;
use readlab_common::{time, Error};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;
use uuid::Uuid;

use crate::api::ApiError;
use crate::AppState;

/// Query parameter carried by session-scoped endpoints
#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionStartRequest {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default = "default_consent")]
    pub consent: bool,
}

fn default_consent() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct SessionStartResponse {
    pub session_id: String,
}

/// POST /api/session/start
///
/// Consent is required; the session id is generated server-side.
pub async fn session_start(
    State(state): State<AppState>,
    Json(req): Json<SessionStartRequest>,
) -> Result<Json<SessionStartResponse>, ApiError> {
    if !req.consent {
        return Err(Error::InvalidInput("Consent required.".to_string()).into());
    }
    let session_id = Uuid::new_v4().to_string();
    state.store.start_session(&session_id, req.source).await?;
    info!("Started session {}", session_id);
    Ok(Json(SessionStartResponse { session_id }))
}

/// POST /api/demographics?session_id=...
///
/// Accepts the questionnaire payload permissively: known fields are
/// normalized, everything else is preserved in extras.
pub async fn submit_demographics(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    Json(payload): Json<Map<String, Value>>,
) -> Result<Json<Value>, ApiError> {
    state.store.session(&query.session_id).await?;
    let normalized = normalize_demographics(&payload);
    state
        .store
        .save_demographics(&query.session_id, &normalized)
        .await?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct FinalCheckPayload {
    #[serde(default)]
    pub used_ai_tools: Option<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub other_tool: String,
}

/// POST /api/final_check?session_id=...
///
/// Persists the final self-report about external tool usage.
pub async fn submit_final_check(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    Json(payload): Json<FinalCheckPayload>,
) -> Result<Json<Value>, ApiError> {
    let report = FinalCheck {
        used_ai_tools: payload.used_ai_tools,
        tools: payload.tools,
        other_tool: payload.other_tool.trim().to_string(),
        server_ts: time::now_ms(),
    };
    state
        .store
        .record_final_check(&query.session_id, report)
        .await?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct ParticipationEndRequest {
    pub session_id: String,
    #[serde(default)]
    pub finished_at_ms: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ParticipationEndResponse {
    pub session_id: String,
    pub total_participation_ms: i64,
}

/// POST /api/log/participation_end
///
/// Computes and persists total participation time from session creation.
pub async fn log_participation_end(
    State(state): State<AppState>,
    Json(req): Json<ParticipationEndRequest>,
) -> Result<Json<ParticipationEndResponse>, ApiError> {
    let total = state
        .store
        .finish_participation(&req.session_id, req.finished_at_ms)
        .await?;
    Ok(Json(ParticipationEndResponse {
        session_id: req.session_id,
        total_participation_ms: total.total_participation_ms,
    }))
}

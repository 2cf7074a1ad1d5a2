//! Telemetry ingestion: attention-time buckets and reading events

use axum::extract::{Query, State};
use axum::Json;
use readlab_common::attention::AttentionOutcome;
use readlab_common::reading::{IncomingEvent, ReadingOutcome, VisibilityStatus};
use serde::Deserialize;
use tracing::debug;

use crate::api::session::SessionQuery;
use crate::api::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AttentionRequest {
    pub bucket: String,
    #[serde(default)]
    pub elapsed_ms: i64,
}

/// POST /api/log/attention?session_id=...
///
/// Accumulates focused time into one pipeline-stage bucket. Unknown bucket
/// names succeed without storing anything; the response says which happened.
pub async fn log_attention(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    Json(req): Json<AttentionRequest>,
) -> Result<Json<AttentionOutcome>, ApiError> {
    let outcome = state
        .store
        .add_attention_time(&query.session_id, &req.bucket, req.elapsed_ms)
        .await?;
    if let AttentionOutcome::Ignored { bucket } = &outcome {
        debug!(
            "Session {}: ignored attention report for unknown bucket '{}'",
            query.session_id, bucket
        );
    }
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct RcEventRequest {
    pub passage_id: String,
    pub status: String,
    #[serde(default)]
    pub page_name: Option<String>,
    pub start_time: i64,
    #[serde(default)]
    pub duration_ms: i64,
}

/// POST /api/log/rc_event?session_id=...
///
/// Ingests one visibility-change event through the reconciler. Raw fields
/// are coerced, never rejected: unrecognized status strings count as
/// "active", negative durations become 0, a missing page name becomes the
/// "unknown" sentinel.
pub async fn log_rc_event(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    Json(req): Json<RcEventRequest>,
) -> Result<Json<ReadingOutcome>, ApiError> {
    let incoming = IncomingEvent::sanitized(
        &req.passage_id,
        VisibilityStatus::parse_lenient(&req.status),
        req.page_name.as_deref(),
        req.start_time,
        req.duration_ms,
    );
    let outcome = state
        .store
        .record_reading_event(&query.session_id, incoming)
        .await?;
    Ok(Json(outcome))
}

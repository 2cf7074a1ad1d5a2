//! Random assignment endpoint: 3 passages + 2:1 source split, deterministic

use axum::extract::{Query, State};
use axum::Json;
use readlab_common::randomize::randomize_session;
use serde::Serialize;
use tracing::info;

use crate::api::session::SessionQuery;
use crate::api::ApiError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct RandomizeResponse {
    pub passage_ids: Vec<String>,
}

/// POST /api/randomize?session_id=...
///
/// Derives the session seed, picks 3 passages, splits the two sources 2:1,
/// and persists the result. Deterministic per session id, so a retried
/// request rewrites the same assignment.
pub async fn randomize(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<RandomizeResponse>, ApiError> {
    state.store.session(&query.session_id).await?;

    let assignment = randomize_session(&state.catalog, &query.session_id)?;
    state
        .store
        .set_assignment(&query.session_id, &assignment)
        .await?;

    info!(
        "Randomized session {}: passages {:?}",
        query.session_id, assignment.passage_keys
    );
    Ok(Json(RandomizeResponse {
        passage_ids: assignment.passage_keys.to_vec(),
    }))
}

//! readlab-api library - study data collection service
//!
//! HTTP surface over the study core: session lifecycle, deterministic
//! randomization, passage/question serving, MCQ submission, post-task
//! ratings, the vocabulary task, and telemetry (attention time + reading
//! events).

use axum::Router;
use readlab_common::content::Catalog;
use readlab_common::store::StudyStore;
use std::sync::Arc;

pub mod api;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Session store (in-memory or SQLite, per configuration)
    pub store: Arc<dyn StudyStore>,
    /// Read-only content catalog, linted at startup
    pub catalog: Arc<Catalog>,
}

impl AppState {
    /// Create new application state
    pub fn new(store: Arc<dyn StudyStore>, catalog: Arc<Catalog>) -> Self {
        Self { store, catalog }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    Router::new()
        .route("/api/health", get(api::health_check))
        .route("/api/session/start", post(api::session_start))
        .route("/api/demographics", post(api::submit_demographics))
        .route("/api/randomize", post(api::randomize))
        .route("/api/passage/:passage_id", get(api::get_passage))
        .route("/api/questions/:passage_id", get(api::get_questions))
        .route("/api/submit_mcq", post(api::submit_mcq))
        .route("/api/posttask", post(api::posttask_feedback))
        .route("/api/posttask_data/:passage_id", get(api::posttask_data))
        .route("/api/vocab/start", post(api::vocab_start))
        .route("/api/vocab/next", get(api::vocab_next))
        .route("/api/vocab/answer", post(api::vocab_answer))
        .route("/api/final_check", post(api::submit_final_check))
        .route("/api/log/participation_end", post(api::log_participation_end))
        .route("/api/log/attention", post(api::log_attention))
        .route("/api/log/rc_event", post(api::log_rc_event))
        .with_state(state)
}

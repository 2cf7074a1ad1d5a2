//! Passage and question serving, plus the post-task review view

use axum::extract::{Path, Query, State};
use axum::Json;
use readlab_common::content::{Choice, Passage, MIN_ITEMS_PER_VARIANT};
use readlab_common::Error;
use serde::Serialize;

use crate::api::session::SessionQuery;
use crate::api::ApiError;
use crate::AppState;

/// GET /api/passage/:passage_id?session_id=...
pub async fn get_passage(
    State(state): State<AppState>,
    Path(passage_id): Path<String>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<Passage>, ApiError> {
    state.store.session(&query.session_id).await?;
    let passage = state.catalog.passage(&passage_id)?;
    Ok(Json(passage.clone()))
}

/// One question as served to the client (id maps from question_id)
#[derive(Debug, Serialize)]
pub struct QuestionOut {
    pub id: String,
    pub prompt: String,
    pub choices: Vec<Choice>,
    pub correct_choice_id: String,
}

#[derive(Debug, Serialize)]
pub struct QuestionsResponse {
    pub passage_id: String,
    pub questions: Vec<QuestionOut>,
}

/// GET /api/questions/:passage_id?session_id=...
///
/// Serves the question set for the variant assigned to this passage.
pub async fn get_questions(
    State(state): State<AppState>,
    Path(passage_id): Path<String>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<QuestionsResponse>, ApiError> {
    state.store.session(&query.session_id).await?;

    let source = state
        .store
        .source_for(&query.session_id, &passage_id)
        .await?
        .ok_or_else(|| {
            Error::InvalidInput("Source not assigned for this passage.".to_string())
        })?;

    let qset = state.catalog.question_set(&passage_id, source)?;
    if qset.len() < MIN_ITEMS_PER_VARIANT {
        return Err(Error::Config(format!(
            "Insufficient questions for assigned source '{}' on passage '{}'",
            source, passage_id
        ))
        .into());
    }

    let questions = qset
        .iter()
        .map(|q| QuestionOut {
            id: q.question_id.clone(),
            prompt: q.prompt.clone(),
            choices: q.choices.clone(),
            correct_choice_id: q.correct_choice_id.clone(),
        })
        .collect();

    Ok(Json(QuestionsResponse {
        passage_id,
        questions,
    }))
}

#[derive(Debug, Serialize)]
pub struct PostTaskQuestion {
    pub question_id: String,
    pub prompt: String,
    pub choices: Vec<Choice>,
    pub user_choice_id: String,
    pub correct_choice_id: String,
    pub is_correct: bool,
}

#[derive(Debug, Serialize)]
pub struct PostTaskDataResponse {
    pub passage: Passage,
    pub questions: Vec<PostTaskQuestion>,
    pub score: u32,
}

/// GET /api/posttask_data/:passage_id?session_id=...
///
/// Review data for the post-task view. Attention checks stay out of the
/// participant-facing summary even though they counted in raw grading.
pub async fn posttask_data(
    State(state): State<AppState>,
    Path(passage_id): Path<String>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<PostTaskDataResponse>, ApiError> {
    state.store.session(&query.session_id).await?;

    let passage = state.catalog.passage(&passage_id)?;
    let Some(submission) = state
        .store
        .mcq_submission(&query.session_id, &passage_id)
        .await?
    else {
        return Err(Error::NotFound("Not ready.".to_string()).into());
    };

    let qset = state.catalog.question_set(&passage_id, submission.source)?;

    let questions = submission
        .per_question
        .iter()
        .filter_map(|row| {
            let q = qset.iter().find(|q| q.question_id == row.question_id)?;
            if q.is_attention_check() {
                return None;
            }
            Some(PostTaskQuestion {
                question_id: row.question_id.clone(),
                prompt: q.prompt.clone(),
                choices: q.choices.clone(),
                user_choice_id: row.user_choice_id.clone(),
                correct_choice_id: row.correct_choice_id.clone(),
                is_correct: row.is_correct,
            })
        })
        .collect();

    Ok(Json(PostTaskDataResponse {
        passage: passage.clone(),
        questions,
        score: submission.score,
    }))
}

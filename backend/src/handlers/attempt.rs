// src/handlers/attempt.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::attempt::{AnswerQuestionRequest, MarkRequest, QuestionBatchRequest, QuestionRequest},
    services::attempt::AttemptService,
    utils::jwt::Claims,
};

/// Selects an option for a question, creating or updating the user's draft.
pub async fn answer(
    State(attempts): State<Arc<AttemptService>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<AnswerQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(|e| AppError::BadRequest(e.to_string()))?;
    let user_id = claims.user_id()?;

    let attempt = attempts
        .answer(payload.question_id, user_id, payload.option_id)
        .await?;

    Ok(Json(attempt))
}

pub async fn clear_answer(
    State(attempts): State<Arc<AttemptService>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<QuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(|e| AppError::BadRequest(e.to_string()))?;
    let user_id = claims.user_id()?;

    let attempt = attempts.clear_answer(payload.question_id, user_id).await?;

    Ok(Json(attempt))
}

/// Finalizes the current draft and reports whether it was correct.
///
/// Points for a correct answer are credited asynchronously, so the user's
/// total may lag this response slightly.
pub async fn submit_answer(
    State(attempts): State<Arc<AttemptService>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<QuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(|e| AppError::BadRequest(e.to_string()))?;
    let user_id = claims.user_id()?;

    let outcome = attempts.submit(payload.question_id, user_id).await?;

    Ok(Json(outcome))
}

pub async fn mark(
    State(attempts): State<Arc<AttemptService>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<QuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(|e| AppError::BadRequest(e.to_string()))?;
    let user_id = claims.user_id()?;

    let attempt = attempts.mark(payload.question_id, user_id).await?;

    Ok(Json(attempt))
}

/// Adds or removes the review mark. Removing a mark when there is no draft
/// responds with `null`.
pub async fn add_remove_mark(
    State(attempts): State<Arc<AttemptService>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<MarkRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(|e| AppError::BadRequest(e.to_string()))?;
    let user_id = claims.user_id()?;

    let attempt = attempts
        .add_remove_mark(payload.question_id, user_id, payload.action)
        .await?;

    Ok(Json(attempt))
}

pub async fn get_latest_answer(
    State(attempts): State<Arc<AttemptService>>,
    Extension(claims): Extension<Claims>,
    Path(question_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let attempt = attempts.get_latest_answer(question_id, user_id).await?;

    Ok(Json(attempt))
}

/// Latest answer per question for a whole question list, keyed by question ID.
pub async fn get_latest_answers(
    State(attempts): State<Arc<AttemptService>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<QuestionBatchRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(|e| AppError::BadRequest(e.to_string()))?;
    let user_id = claims.user_id()?;

    let latest = attempts
        .get_latest_answers(&payload.question_ids, user_id)
        .await?;

    Ok(Json(latest))
}

pub async fn get_marks(
    State(attempts): State<Arc<AttemptService>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<QuestionBatchRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(|e| AppError::BadRequest(e.to_string()))?;
    let user_id = claims.user_id()?;

    let marked = attempts.get_marks(&payload.question_ids, user_id).await?;

    Ok(Json(marked))
}

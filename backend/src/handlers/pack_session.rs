// src/handlers/pack_session.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::pack_session::{FinishPackRequest, PackSessionQuery, TakePackRequest},
    services::pack_session::PackSessionService,
    utils::jwt::Claims,
};

pub async fn take(
    State(packs): State<Arc<PackSessionService>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<TakePackRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(|e| AppError::BadRequest(e.to_string()))?;
    let user_id = claims.user_id()?;

    let session = packs.take(payload.question_pack_id, user_id).await?;

    Ok(Json(session))
}

pub async fn finish(
    State(packs): State<Arc<PackSessionService>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<FinishPackRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(|e| AppError::BadRequest(e.to_string()))?;
    let user_id = claims.user_id()?;

    let session = packs.finish(payload.question_pack_attempt_id, user_id).await?;

    Ok(Json(session))
}

/// Lists the caller's own pack sessions, newest first.
pub async fn list(
    State(packs): State<Arc<PackSessionService>>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<PackSessionQuery>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let page = packs.list(query.into_filter(user_id)).await?;

    Ok(Json(page))
}

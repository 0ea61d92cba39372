// src/handlers/analytic.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use chrono::Utc;

use crate::{
    error::AppError,
    models::{
        page::{Page, PageParams},
        point::UserPoint,
    },
    services::attempt::AttemptService,
    store::PointLedger,
    utils::jwt::Claims,
};

/// Totals over the caller's attempt history.
pub async fn attempt_summary(
    State(attempts): State<Arc<AttemptService>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let summary = attempts.attempt_summary(user_id).await?;

    Ok(Json(summary))
}

/// The caller's point balance. A user who never earned points gets a zero
/// balance rather than a 404.
pub async fn get_point(
    State(points): State<Arc<dyn PointLedger>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let point = match points.get_by_user(user_id).await {
        Ok(point) => point,
        Err(e) if e.is_not_found() => UserPoint {
            user_id,
            points: 0,
            updated_at: Utc::now(),
        },
        Err(e) => return Err(e.into()),
    };

    Ok(Json(point))
}

/// Leaderboard: highest balance first, ties by user ID.
pub async fn list_points(
    State(points): State<Arc<dyn PointLedger>>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let (data, total) = points.list(params.offset(), params.limit()).await?;

    Ok(Json(Page::new(data, params, total)))
}

//! Review session API endpoints
//!
//! - POST /api/v1/review-sessions - Resume today's session for a content type, or start one
//! - GET /api/v1/review-sessions/{id}
//! - PUT|PATCH /api/v1/review-sessions/{id}/progress
//! - POST /api/v1/review-sessions/{id}/complete

use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{CreateReviewSessionInput, ReviewSession};

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub current_index: i32,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(get_or_create))
        .route("/{id}", get(get_session))
        .route("/{id}/progress", put(update_progress).patch(update_progress))
        .route("/{id}/complete", post(complete))
}

async fn get_or_create(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateReviewSessionInput>,
) -> Result<Json<ReviewSession>, ApiError> {
    Ok(Json(state.review_session_service.get_or_create(user.0.id, body).await?))
}

async fn get_session(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<ReviewSession>, ApiError> {
    Ok(Json(state.review_session_service.get(user.0.id, id).await?))
}

async fn update_progress(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<ProgressRequest>,
) -> Result<Json<ReviewSession>, ApiError> {
    let session = state
        .review_session_service
        .update_progress(user.0.id, id, body.current_index)
        .await?;
    Ok(Json(session))
}

async fn complete(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<ReviewSession>, ApiError> {
    Ok(Json(state.review_session_service.complete(user.0.id, id).await?))
}

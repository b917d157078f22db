//! Comment and like API endpoints
//!
//! - GET /api/v1/contents/{id}/comments - Comment tree of a content
//! - POST /api/v1/comments - Add a comment or reply
//! - DELETE /api/v1/comments/{id} - Delete own comment (admins: any)
//! - POST /api/v1/likes - Toggle a like
//! - GET /api/v1/likes - Like status of a target

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, OptionalUser};
use crate::api::responses::ListResponse;
use crate::models::{Comment, CommentWithMeta, CreateCommentInput, LikeStatus, LikeTargetType};

/// Like target, as JSON body or query string
#[derive(Debug, Deserialize)]
pub struct LikeTarget {
    pub target_type: LikeTargetType,
    pub target_id: i64,
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/contents/{id}/comments", get(list_comments))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/comments", post(create_comment))
        .route("/comments/{id}", delete(delete_comment))
        .route("/likes", post(toggle_like).get(like_status))
}

/// GET /api/v1/contents/{id}/comments
async fn list_comments(
    State(state): State<AppState>,
    viewer: OptionalUser,
    Path(content_id): Path<i64>,
) -> Result<Json<ListResponse<CommentWithMeta>>, ApiError> {
    let tree = state.comment_service.list(viewer.as_ref(), content_id).await?;
    Ok(Json(tree.into()))
}

/// POST /api/v1/comments
async fn create_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateCommentInput>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let comment = state.comment_service.create(&user.0, body).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// DELETE /api/v1/comments/{id}
async fn delete_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.comment_service.delete(&user.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/likes
async fn toggle_like(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<LikeTarget>,
) -> Result<Json<LikeStatus>, ApiError> {
    let status = state
        .comment_service
        .toggle_like(&user.0, body.target_type, body.target_id)
        .await?;
    Ok(Json(status))
}

/// GET /api/v1/likes?target_type=CONTENT&target_id=1
async fn like_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<LikeTarget>,
) -> Result<Json<LikeStatus>, ApiError> {
    let status = state
        .comment_service
        .like_status(&user.0, query.target_type, query.target_id)
        .await?;
    Ok(Json(status))
}

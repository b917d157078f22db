//! Admin API endpoints
//!
//! - GET /api/v1/admin/users - List accounts
//! - PUT /api/v1/admin/users/{id}/role - Change a user's role
//! - PUT /api/v1/admin/comments/{id}/status - Moderate a comment
//! - GET /api/v1/admin/stats - Request statistics

use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::auth::UserResponse;
use crate::api::common::AdminPaginationQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Comment, CommentStatus, UserRole};

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
pub struct ModerateCommentRequest {
    pub status: CommentStatus,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_requests: u64,
    pub avg_response_time_ms: f64,
    pub uptime_seconds: u64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{id}/role", put(change_role))
        .route("/comments/{id}/status", put(moderate_comment))
        .route("/stats", get(stats))
}

/// GET /api/v1/admin/users
async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<AdminPaginationQuery>,
) -> Result<Json<UserListResponse>, ApiError> {
    let page = query.page.max(1);
    let per_page = query.per_page.clamp(1, 100);
    let (users, total) = state.user_service.list(page as i64, per_page as i64).await?;

    Ok(Json(UserListResponse {
        users: users.into_iter().map(Into::into).collect(),
        total,
        page,
        per_page,
    }))
}

/// PUT /api/v1/admin/users/{id}/role
async fn change_role(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<ChangeRoleRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    if admin.0.id == id && body.role != UserRole::Admin {
        return Err(ApiError::validation_error("Admins cannot demote themselves"));
    }
    let user = state.user_service.change_role(id, body.role).await?;
    tracing::info!(admin_id = admin.0.id, user_id = id, role = %body.role, "Role changed");
    Ok(Json(user.into()))
}

/// PUT /api/v1/admin/comments/{id}/status
async fn moderate_comment(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<ModerateCommentRequest>,
) -> Result<Json<Comment>, ApiError> {
    Ok(Json(state.comment_service.moderate(&admin.0, id, body.status).await?))
}

/// GET /api/v1/admin/stats
async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = &state.request_stats;
    Json(StatsResponse {
        total_requests: stats.total_requests(),
        avg_response_time_ms: stats.avg_response_time_us() / 1000.0,
        uptime_seconds: stats.uptime_seconds(),
    })
}

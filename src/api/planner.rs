//! Planner API endpoints
//!
//! - GET /api/v1/planner/tasks?start=&end= - Manual tasks merged with generated review tasks
//! - GET /api/v1/planner/manual?start=&end= - Manual tasks only
//! - POST /api/v1/planner/tasks
//! - PUT /api/v1/planner/tasks/{id}
//! - DELETE /api/v1/planner/tasks/{id}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};

use crate::api::common::DateRangeQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::ListResponse;
use crate::models::{CreatePlannerTaskInput, PlannerTask, UpdatePlannerTaskInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/{id}", put(update_task).delete(delete_task))
        .route("/manual", get(list_manual))
}

async fn list_tasks(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(range): Query<DateRangeQuery>,
) -> Result<Json<ListResponse<PlannerTask>>, ApiError> {
    let tasks = state
        .planner_service
        .get_planner_tasks(user.0.id, range.start, range.end)
        .await?;
    Ok(Json(tasks.into()))
}

async fn list_manual(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(range): Query<DateRangeQuery>,
) -> Result<Json<ListResponse<PlannerTask>>, ApiError> {
    let tasks = state
        .planner_service
        .list_manual(user.0.id, range.start, range.end)
        .await?;
    Ok(Json(tasks.into()))
}

async fn create_task(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreatePlannerTaskInput>,
) -> Result<(StatusCode, Json<PlannerTask>), ApiError> {
    let task = state.planner_service.create(user.0.id, body).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn update_task(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdatePlannerTaskInput>,
) -> Result<Json<PlannerTask>, ApiError> {
    Ok(Json(state.planner_service.update(user.0.id, id, body).await?))
}

async fn delete_task(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.planner_service.delete(user.0.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

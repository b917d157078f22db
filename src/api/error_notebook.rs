//! Error notebook API endpoints
//!
//! - GET /api/v1/error-notebook - Caller's entries (difficulty, in_review, tags, page, limit)
//! - POST /api/v1/error-notebook
//! - GET /api/v1/error-notebook/stats
//! - GET /api/v1/error-notebook/{id}
//! - PUT /api/v1/error-notebook/{id}
//! - DELETE /api/v1/error-notebook/{id}
//! - GET /api/v1/error-notebook/{id}/review - Data for a review screen
//! - POST /api/v1/error-notebook/{id}/review - Record a review

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::split_list;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{
    CreateErrorNotebookInput, Difficulty, ErrorNotebookEntry, ErrorNotebookFilter, ErrorNotebookPage,
    ErrorNotebookStats, UpdateErrorNotebookInput,
};
use crate::services::error_notebook::{CreatedErrorNote, ErrorNoteReviewData};
use crate::services::unified_review::ReviewOutcome;

#[derive(Debug, Deserialize)]
pub struct ListEntriesQuery {
    pub limit: Option<u32>,
    pub page: Option<u32>,
    pub difficulty: Option<Difficulty>,
    pub is_in_review_system: Option<bool>,
    /// Comma-separated; entries with any of these tags
    pub tags: Option<String>,
}

impl ListEntriesQuery {
    fn into_filter(self) -> ErrorNotebookFilter {
        let defaults = ErrorNotebookFilter::default();
        ErrorNotebookFilter {
            limit: self.limit.unwrap_or(defaults.limit),
            page: self.page.unwrap_or(defaults.page),
            difficulty: self.difficulty,
            is_in_review_system: self.is_in_review_system,
            tags: split_list(self.tags.as_deref()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RecordReviewRequest {
    pub grade: i64,
    #[serde(default)]
    pub review_time_ms: i64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_entries).post(create_entry))
        .route("/stats", get(stats))
        .route("/{id}", get(get_entry).put(update_entry).delete(delete_entry))
        .route("/{id}/review", get(prepare_review).post(record_review))
}

async fn list_entries(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListEntriesQuery>,
) -> Result<Json<ErrorNotebookPage>, ApiError> {
    let page = state
        .error_notebook_service
        .list(user.0.id, query.into_filter())
        .await?;
    Ok(Json(page))
}

async fn create_entry(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateErrorNotebookInput>,
) -> Result<(StatusCode, Json<CreatedErrorNote>), ApiError> {
    let created = state.error_notebook_service.create(user.0.id, body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn stats(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ErrorNotebookStats>, ApiError> {
    Ok(Json(state.error_notebook_service.stats(user.0.id).await?))
}

async fn get_entry(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<ErrorNotebookEntry>, ApiError> {
    Ok(Json(state.error_notebook_service.get(user.0.id, id).await?))
}

async fn update_entry(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateErrorNotebookInput>,
) -> Result<Json<ErrorNotebookEntry>, ApiError> {
    Ok(Json(state.error_notebook_service.update(user.0.id, id, body).await?))
}

async fn delete_entry(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.error_notebook_service.delete(user.0.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn prepare_review(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<ErrorNoteReviewData>, ApiError> {
    Ok(Json(state.error_notebook_service.prepare_for_review(user.0.id, id).await?))
}

async fn record_review(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<RecordReviewRequest>,
) -> Result<Json<ReviewOutcome>, ApiError> {
    let outcome = state
        .error_notebook_service
        .record_review(user.0.id, id, body.grade, body.review_time_ms)
        .await?;
    Ok(Json(outcome))
}

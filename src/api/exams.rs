//! Simulated exam API endpoints
//!
//! Exams:
//! - GET /api/v1/exams - List (status, difficulty, created_by, is_public, tags, q, page, limit)
//! - POST /api/v1/exams - Create (mentors and admins)
//! - GET /api/v1/exams/{id}
//! - PUT /api/v1/exams/{id}
//! - DELETE /api/v1/exams/{id}
//! - POST /api/v1/exams/{id}/start - Start an attempt
//! - GET /api/v1/exams/results?user_id= - Attempts of a user (default: caller)
//! - GET /api/v1/exams/stats?user_id= - Aggregated results
//!
//! Attempts:
//! - GET /api/v1/exam-results/{id}
//! - POST /api/v1/exam-results/{id}/answers
//! - POST /api/v1/exam-results/{id}/finish

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::split_list;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::ListResponse;
use crate::models::{
    CreateExamInput, Difficulty, ExamAnswer, ExamFilter, ExamResult, ExamStatus, SimulatedExam, UpdateExamInput,
    User, UserExamStats,
};
use crate::services::simulated_exam::ExamPage;

#[derive(Debug, Deserialize)]
pub struct ListExamsQuery {
    pub limit: Option<u32>,
    pub page: Option<u32>,
    pub status: Option<ExamStatus>,
    pub difficulty: Option<Difficulty>,
    pub created_by: Option<i64>,
    pub is_public: Option<bool>,
    /// Comma-separated tag list
    pub tags: Option<String>,
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub question_id: i64,
    pub answer: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/exams", get(list_exams).post(create_exam))
        .route("/exams/results", get(list_results))
        .route("/exams/stats", get(user_stats))
        .route("/exams/{id}", get(get_exam).put(update_exam).delete(delete_exam))
        .route("/exams/{id}/start", post(start_exam))
        .route("/exam-results/{id}", get(get_result))
        .route("/exam-results/{id}/answers", post(submit_answer))
        .route("/exam-results/{id}/finish", post(finish_exam))
}

/// GET /api/v1/exams
///
/// Students only see published exams.
async fn list_exams(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListExamsQuery>,
) -> Result<Json<ExamPage>, ApiError> {
    let defaults = ExamFilter::default();
    let status = if user.0.is_mentor() {
        query.status
    } else {
        Some(ExamStatus::Published)
    };
    let filter = ExamFilter {
        limit: query.limit.unwrap_or(defaults.limit),
        page: query.page.unwrap_or(defaults.page),
        status,
        difficulty: query.difficulty,
        created_by: query.created_by,
        is_public: query.is_public,
        tags: split_list(query.tags.as_deref()),
        query: query.q,
    };
    Ok(Json(state.exam_service.list(filter).await?))
}

/// POST /api/v1/exams
async fn create_exam(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateExamInput>,
) -> Result<(StatusCode, Json<SimulatedExam>), ApiError> {
    let exam = state.exam_service.create(&user.0, body).await?;
    Ok((StatusCode::CREATED, Json(exam)))
}

/// GET /api/v1/exams/{id}
async fn get_exam(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<SimulatedExam>, ApiError> {
    Ok(Json(state.exam_service.get(&user.0, id).await?))
}

/// PUT /api/v1/exams/{id}
async fn update_exam(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateExamInput>,
) -> Result<Json<SimulatedExam>, ApiError> {
    Ok(Json(state.exam_service.update(&user.0, id, body).await?))
}

/// DELETE /api/v1/exams/{id}
async fn delete_exam(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.exam_service.delete(&user.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/exams/{id}/start
async fn start_exam(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<ExamResult>), ApiError> {
    let result = state.exam_service.start(user.0.id, id).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// GET /api/v1/exams/results
async fn list_results(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<UserQuery>,
) -> Result<Json<ListResponse<ExamResult>>, ApiError> {
    let user_id = target_user(&user.0, query.user_id)?;
    Ok(Json(state.exam_service.results_for_user(user_id).await?.into()))
}

/// GET /api/v1/exams/stats
async fn user_stats(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<UserQuery>,
) -> Result<Json<UserExamStats>, ApiError> {
    let user_id = target_user(&user.0, query.user_id)?;
    Ok(Json(state.exam_service.user_stats(user_id).await?))
}

/// GET /api/v1/exam-results/{id}
async fn get_result(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<ExamResult>, ApiError> {
    Ok(Json(state.exam_service.get_result(&user.0, id).await?))
}

/// POST /api/v1/exam-results/{id}/answers
async fn submit_answer(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<SubmitAnswerRequest>,
) -> Result<Json<ExamAnswer>, ApiError> {
    let answer = state
        .exam_service
        .submit_answer(user.0.id, id, body.question_id, &body.answer)
        .await?;
    Ok(Json(answer))
}

/// POST /api/v1/exam-results/{id}/finish
async fn finish_exam(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<ExamResult>, ApiError> {
    Ok(Json(state.exam_service.finish(user.0.id, id).await?))
}

/// Whose results to read; only admins may read another user's
fn target_user(caller: &User, requested: Option<i64>) -> Result<i64, ApiError> {
    let user_id = requested.unwrap_or(caller.id);
    if !caller.can_manage(user_id) {
        return Err(ApiError::forbidden("Results belong to another user"));
    }
    Ok(user_id)
}

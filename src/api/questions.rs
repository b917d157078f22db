//! Question bank API endpoints
//!
//! - GET /api/v1/questions - Paginated list (subject, difficulty, tag, q)
//! - GET /api/v1/questions/subjects - Distinct subjects
//! - GET /api/v1/questions/{id}
//! - POST /api/v1/questions - Create (mentors and admins)
//! - PUT /api/v1/questions/{id}
//! - DELETE /api/v1/questions/{id}
//! - POST /api/v1/questions/{id}/review - Add to the caller's review queue

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{default_page, default_page_size};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{ListResponse, PageResponse};
use crate::models::{
    CreateQuestionInput, Difficulty, FsrsCard, ListParams, Question, QuestionFilter, UpdateQuestionInput,
};

#[derive(Debug, Deserialize)]
pub struct ListQuestionsQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    pub subject: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub tag: Option<String>,
    pub q: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_questions).post(create_question))
        .route("/subjects", get(list_subjects))
        .route(
            "/{id}",
            get(get_question).put(update_question).delete(delete_question),
        )
        .route("/{id}/review", post(add_to_review))
}

/// GET /api/v1/questions
async fn list_questions(
    State(state): State<AppState>,
    Query(query): Query<ListQuestionsQuery>,
) -> Result<Json<PageResponse<Question>>, ApiError> {
    let params = ListParams::new(query.page, query.page_size);
    let filter = QuestionFilter {
        subject: query.subject,
        difficulty: query.difficulty,
        tag: query.tag,
        query: query.q,
    };
    Ok(Json(state.question_service.list(filter, params).await?.into()))
}

/// GET /api/v1/questions/subjects
async fn list_subjects(State(state): State<AppState>) -> Result<Json<ListResponse<String>>, ApiError> {
    Ok(Json(state.question_service.subjects().await?.into()))
}

/// GET /api/v1/questions/{id}
async fn get_question(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Question>, ApiError> {
    Ok(Json(state.question_service.get(id).await?))
}

/// POST /api/v1/questions
async fn create_question(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateQuestionInput>,
) -> Result<(StatusCode, Json<Question>), ApiError> {
    let question = state.question_service.create(&user.0, body).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

/// PUT /api/v1/questions/{id}
async fn update_question(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateQuestionInput>,
) -> Result<Json<Question>, ApiError> {
    Ok(Json(state.question_service.update(&user.0, id, body).await?))
}

/// DELETE /api/v1/questions/{id}
async fn delete_question(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.question_service.delete(&user.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/questions/{id}/review
async fn add_to_review(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<FsrsCard>), ApiError> {
    let card = state.question_service.add_to_review(user.0.id, id).await?;
    Ok((StatusCode::CREATED, Json(card)))
}

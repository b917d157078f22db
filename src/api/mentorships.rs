//! Mentorship API endpoints
//!
//! Mentor profiles:
//! - GET /api/v1/mentor-profiles - Mentors accepting mentees
//! - GET /api/v1/mentor-profiles/{user_id}
//! - PUT /api/v1/mentor-profiles/me - Create or update own profile (mentors)
//!
//! Mentorships:
//! - GET /api/v1/mentorships?mentor_id=&mentee_id=&status=
//! - POST /api/v1/mentorships - Request a mentorship
//! - GET /api/v1/mentorships/{id}
//! - DELETE /api/v1/mentorships/{id}
//! - GET /api/v1/mentorships/{id}/summary
//! - POST /api/v1/mentorships/{id}/accept
//! - POST /api/v1/mentorships/{id}/cancel
//! - POST /api/v1/mentorships/{id}/complete
//! - POST /api/v1/mentorships/{id}/meetings
//! - PUT /api/v1/mentorships/{id}/objectives

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::ListResponse;
use crate::models::{
    CreateMentorshipInput, MentorProfile, Mentorship, MentorshipFilter, MentorshipSummary, UpsertMentorProfileInput,
};

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteRequest {
    /// 1 to 5
    pub rating: Option<i32>,
    pub feedback: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MeetingRequest {
    /// Defaults to now
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ObjectivesRequest {
    pub objectives: Vec<String>,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/mentor-profiles", get(available_mentors))
        .route("/mentor-profiles/{user_id}", get(get_profile))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/mentor-profiles/me", put(upsert_profile))
        .route("/mentorships", get(list_mentorships).post(create_mentorship))
        .route("/mentorships/{id}", get(get_mentorship).delete(delete_mentorship))
        .route("/mentorships/{id}/summary", get(summary))
        .route("/mentorships/{id}/accept", post(accept))
        .route("/mentorships/{id}/cancel", post(cancel))
        .route("/mentorships/{id}/complete", post(complete))
        .route("/mentorships/{id}/meetings", post(record_meeting))
        .route("/mentorships/{id}/objectives", put(update_objectives))
}

async fn available_mentors(State(state): State<AppState>) -> Result<Json<ListResponse<MentorProfile>>, ApiError> {
    Ok(Json(state.mentorship_service.available_mentors().await?.into()))
}

async fn get_profile(State(state): State<AppState>, Path(user_id): Path<i64>) -> Result<Json<MentorProfile>, ApiError> {
    Ok(Json(state.mentorship_service.get_profile(user_id).await?))
}

async fn upsert_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<UpsertMentorProfileInput>,
) -> Result<Json<MentorProfile>, ApiError> {
    Ok(Json(state.mentorship_service.upsert_profile(&user.0, body).await?))
}

async fn list_mentorships(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(filter): Query<MentorshipFilter>,
) -> Result<Json<ListResponse<Mentorship>>, ApiError> {
    Ok(Json(state.mentorship_service.list(&user.0, filter).await?.into()))
}

async fn create_mentorship(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateMentorshipInput>,
) -> Result<(StatusCode, Json<Mentorship>), ApiError> {
    let mentorship = state.mentorship_service.create(&user.0, body).await?;
    Ok((StatusCode::CREATED, Json(mentorship)))
}

async fn get_mentorship(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Mentorship>, ApiError> {
    Ok(Json(state.mentorship_service.get(&user.0, id).await?))
}

async fn delete_mentorship(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.mentorship_service.delete(&user.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn summary(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<MentorshipSummary>, ApiError> {
    Ok(Json(state.mentorship_service.summary(&user.0, id).await?))
}

async fn accept(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Mentorship>, ApiError> {
    Ok(Json(state.mentorship_service.accept(&user.0, id).await?))
}

async fn cancel(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    body: Option<Json<CancelRequest>>,
) -> Result<Json<Mentorship>, ApiError> {
    let Json(body) = body.unwrap_or_default();
    Ok(Json(state.mentorship_service.cancel(&user.0, id, body.reason).await?))
}

async fn complete(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    body: Option<Json<CompleteRequest>>,
) -> Result<Json<Mentorship>, ApiError> {
    let Json(body) = body.unwrap_or_default();
    let mentorship = state
        .mentorship_service
        .complete(&user.0, id, body.rating, body.feedback)
        .await?;
    Ok(Json(mentorship))
}

async fn record_meeting(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    body: Option<Json<MeetingRequest>>,
) -> Result<Json<Mentorship>, ApiError> {
    let Json(body) = body.unwrap_or_default();
    Ok(Json(state.mentorship_service.record_meeting(&user.0, id, body.date).await?))
}

async fn update_objectives(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<ObjectivesRequest>,
) -> Result<Json<Mentorship>, ApiError> {
    let mentorship = state
        .mentorship_service
        .update_objectives(&user.0, id, body.objectives)
        .await?;
    Ok(Json(mentorship))
}

//! Unified review API endpoints
//!
//! Every route works on the caller's own cards:
//! - GET /api/v1/unified-reviews/due - Overdue cards (limit 200)
//! - GET /api/v1/unified-reviews/today - Due before the end of today
//! - GET /api/v1/unified-reviews/future - Due from tomorrow on
//! - GET /api/v1/unified-reviews/completed?days=&content_type=
//! - GET /api/v1/unified-reviews/page?page_size=&cursor=&due_only=&content_type=&deck_id=
//! - GET /api/v1/unified-reviews/range?start=&end=
//! - GET /api/v1/unified-reviews/summary - Daily summary
//! - GET /api/v1/unified-reviews/item?content_type=&content_id=
//! - GET /api/v1/unified-reviews/preview?content_type=&content_id=
//! - GET /api/v1/unified-reviews/history?content_type=&content_id=
//! - POST /api/v1/unified-reviews/record

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use crate::api::common::DateRangeQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::ListResponse;
use crate::models::{DuePage, FsrsCard, ReviewContentType, ReviewHistoryEntry};
use crate::services::fsrs::SchedulingCards;
use crate::services::unified_review::{DailySummary, DuePageRequest, ReviewOutcome};

#[derive(Debug, Deserialize)]
pub struct CompletedQuery {
    pub days: Option<i64>,
    pub content_type: Option<ReviewContentType>,
}

/// Identifies one reviewable item
#[derive(Debug, Deserialize)]
pub struct ItemQuery {
    pub content_type: ReviewContentType,
    pub content_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct RecordReviewRequest {
    pub content_type: ReviewContentType,
    pub content_id: i64,
    /// 0 = again, 1 = hard, 2 = good, 3 = easy
    pub grade: i64,
    #[serde(default)]
    pub review_time_ms: i64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/due", get(due))
        .route("/today", get(today))
        .route("/future", get(future))
        .route("/completed", get(completed))
        .route("/page", get(due_page))
        .route("/range", get(range))
        .route("/summary", get(summary))
        .route("/item", get(item))
        .route("/preview", get(preview))
        .route("/history", get(history))
        .route("/record", post(record))
}

async fn due(State(state): State<AppState>, user: AuthenticatedUser) -> Result<Json<ListResponse<FsrsCard>>, ApiError> {
    Ok(Json(state.review_service.due(user.0.id, Utc::now()).await?.into()))
}

async fn today(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ListResponse<FsrsCard>>, ApiError> {
    Ok(Json(state.review_service.today(user.0.id, Utc::now()).await?.into()))
}

async fn future(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ListResponse<FsrsCard>>, ApiError> {
    Ok(Json(state.review_service.future(user.0.id, Utc::now()).await?.into()))
}

async fn completed(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<CompletedQuery>,
) -> Result<Json<ListResponse<FsrsCard>>, ApiError> {
    let cards = state
        .review_service
        .completed(user.0.id, query.days, query.content_type, Utc::now())
        .await?;
    Ok(Json(cards.into()))
}

async fn due_page(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<DuePageRequest>,
) -> Result<Json<DuePage>, ApiError> {
    Ok(Json(state.review_service.due_page(user.0.id, query, Utc::now()).await?))
}

async fn range(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<DateRangeQuery>,
) -> Result<Json<ListResponse<FsrsCard>>, ApiError> {
    let cards = state
        .review_service
        .due_between(user.0.id, query.start, query.end)
        .await?;
    Ok(Json(cards.into()))
}

async fn summary(State(state): State<AppState>, user: AuthenticatedUser) -> Result<Json<DailySummary>, ApiError> {
    Ok(Json(state.review_service.daily_summary(user.0.id, Utc::now()).await?))
}

async fn item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ItemQuery>,
) -> Result<Json<FsrsCard>, ApiError> {
    state
        .review_service
        .get_item(user.0.id, query.content_type, query.content_id)
        .await?
        .map(Json)
        .ok_or_else(|| {
            ApiError::not_found(format!(
                "Review item not found: {} {}",
                query.content_type, query.content_id
            ))
        })
}

async fn preview(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ItemQuery>,
) -> Result<Json<SchedulingCards>, ApiError> {
    let cards = state
        .review_service
        .preview(user.0.id, query.content_type, query.content_id, Utc::now())
        .await?;
    Ok(Json(cards))
}

async fn history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ItemQuery>,
) -> Result<Json<ListResponse<ReviewHistoryEntry>>, ApiError> {
    let entries = state
        .review_service
        .history(user.0.id, query.content_type, query.content_id)
        .await?;
    Ok(Json(entries.into()))
}

async fn record(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<RecordReviewRequest>,
) -> Result<Json<ReviewOutcome>, ApiError> {
    let outcome = state
        .review_service
        .record(
            user.0.id,
            body.content_type,
            body.content_id,
            body.grade,
            body.review_time_ms,
            Utc::now(),
        )
        .await?;
    Ok(Json(outcome))
}

//! Content API endpoints
//!
//! - GET /api/v1/contents - Paginated list with filters
//! - GET /api/v1/contents/{id} - Content by id (counts a view)
//! - GET /api/v1/contents/slug/{slug} - Content by slug (counts a view)
//! - POST /api/v1/contents - Create (mentors and admins)
//! - PUT /api/v1/contents/{id} - Update (author or admin)
//! - DELETE /api/v1/contents/{id} - Delete (author or admin)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{default_page, default_page_size};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, OptionalUser};
use crate::api::responses::PageResponse;
use crate::models::{Content, ContentFilter, ContentStatus, CreateContentInput, ListParams, UpdateContentInput};

/// Query parameters for listing contents
#[derive(Debug, Deserialize)]
pub struct ListContentsQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    pub status: Option<ContentStatus>,
    pub category_id: Option<i64>,
    pub tag: Option<String>,
    pub author_id: Option<i64>,
    /// Text search on title and body
    pub q: Option<String>,
}

impl ListContentsQuery {
    fn filter(&self) -> ContentFilter {
        ContentFilter {
            status: self.status,
            category_id: self.category_id,
            tag: self.tag.clone(),
            author_id: self.author_id,
            query: self.q.clone(),
            ..Default::default()
        }
    }
}

/// Routes readable without a session
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_contents))
        .route("/{id}", get(get_content))
        .route("/slug/{slug}", get(get_content_by_slug))
}

/// Routes that need a session
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_content))
        .route("/{id}", put(update_content).delete(delete_content))
}

/// GET /api/v1/contents
async fn list_contents(
    State(state): State<AppState>,
    viewer: OptionalUser,
    Query(query): Query<ListContentsQuery>,
) -> Result<Json<PageResponse<Content>>, ApiError> {
    let params = ListParams::new(query.page, query.page_size);
    let result = state
        .content_service
        .list(viewer.as_ref(), query.filter(), params)
        .await?;
    Ok(Json(result.into()))
}

/// GET /api/v1/contents/{id}
async fn get_content(
    State(state): State<AppState>,
    viewer: OptionalUser,
    Path(id): Path<i64>,
) -> Result<Json<Content>, ApiError> {
    Ok(Json(state.content_service.get(viewer.as_ref(), id).await?))
}

/// GET /api/v1/contents/slug/{slug}
async fn get_content_by_slug(
    State(state): State<AppState>,
    viewer: OptionalUser,
    Path(slug): Path<String>,
) -> Result<Json<Content>, ApiError> {
    Ok(Json(state.content_service.get_by_slug(viewer.as_ref(), &slug).await?))
}

/// POST /api/v1/contents
async fn create_content(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateContentInput>,
) -> Result<(StatusCode, Json<Content>), ApiError> {
    let content = state.content_service.create(&user.0, body).await?;
    Ok((StatusCode::CREATED, Json(content)))
}

/// PUT /api/v1/contents/{id}
async fn update_content(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateContentInput>,
) -> Result<Json<Content>, ApiError> {
    Ok(Json(state.content_service.update(&user.0, id, body).await?))
}

/// DELETE /api/v1/contents/{id}
async fn delete_content(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.content_service.delete(&user.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

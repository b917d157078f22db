//! Category API endpoints
//!
//! Public:
//! - GET /api/v1/categories - Flat list
//! - GET /api/v1/categories/tree - Category tree
//! - GET /api/v1/categories/{id} - One category
//! - GET /api/v1/categories/slug/{slug} - Category by slug
//! - GET /api/v1/categories/{id}/contents - Published contents in the category and below
//!
//! Admin:
//! - POST /api/v1/admin/categories
//! - PUT /api/v1/admin/categories/{id}
//! - DELETE /api/v1/admin/categories/{id}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState, OptionalUser};
use crate::api::responses::{ListResponse, PageResponse};
use crate::models::{Category, CategoryTree, Content, ContentFilter, CreateCategoryInput, UpdateCategoryInput};

/// Build the public categories router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories))
        .route("/tree", get(get_category_tree))
        .route("/{id}", get(get_category))
        .route("/slug/{slug}", get(get_category_by_slug))
        .route("/{id}/contents", get(get_category_contents))
}

/// Build the admin categories router
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_category))
        .route("/{id}", put(update_category).delete(delete_category))
}

/// GET /api/v1/categories
async fn list_categories(State(state): State<AppState>) -> Result<Json<ListResponse<Category>>, ApiError> {
    Ok(Json(state.category_service.list().await?.into()))
}

/// GET /api/v1/categories/tree
async fn get_category_tree(State(state): State<AppState>) -> Result<Json<ListResponse<CategoryTree>>, ApiError> {
    Ok(Json(state.category_service.list_tree().await?.into()))
}

/// GET /api/v1/categories/{id}
async fn get_category(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.category_service.get_by_id(id).await?))
}

/// GET /api/v1/categories/slug/{slug}
async fn get_category_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Category>, ApiError> {
    state
        .category_service
        .get_by_slug(&slug)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Category not found: {}", slug)))
}

/// GET /api/v1/categories/{id}/contents
async fn get_category_contents(
    State(state): State<AppState>,
    viewer: OptionalUser,
    Path(id): Path<i64>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PageResponse<Content>>, ApiError> {
    let filter = ContentFilter {
        category_ids: state.category_service.subtree_ids(id).await?,
        ..Default::default()
    };
    let result = state
        .content_service
        .list(viewer.as_ref(), filter, query.params())
        .await?;
    Ok(Json(result.into()))
}

/// POST /api/v1/admin/categories
async fn create_category(
    State(state): State<AppState>,
    Json(body): Json<CreateCategoryInput>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let category = state.category_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// PUT /api/v1/admin/categories/{id}
async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCategoryInput>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.category_service.update(id, body).await?))
}

/// DELETE /api/v1/admin/categories/{id}
async fn delete_category(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    state.category_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

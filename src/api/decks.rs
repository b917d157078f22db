//! Deck and flashcard API endpoints
//!
//! Decks:
//! - GET /api/v1/decks/public - Public decks of every user
//! - GET /api/v1/decks/{id} - Deck (public, or owned by the caller)
//! - GET /api/v1/decks - Caller's decks
//! - POST /api/v1/decks
//! - PUT /api/v1/decks/{id}
//! - DELETE /api/v1/decks/{id}
//! - GET /api/v1/decks/search?q=
//! - GET /api/v1/decks/favorites
//! - GET /api/v1/decks/tags
//! - GET /api/v1/decks/stats
//! - POST /api/v1/decks/{id}/favorite
//! - POST /api/v1/decks/{id}/visibility
//! - POST /api/v1/decks/{id}/recalculate
//! - GET /api/v1/decks/{id}/flashcards
//!
//! Flashcards:
//! - POST /api/v1/flashcards
//! - GET /api/v1/flashcards/{id}
//! - PUT /api/v1/flashcards/{id}
//! - DELETE /api/v1/flashcards/{id}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, OptionalUser};
use crate::api::responses::{ListResponse, PageResponse};
use crate::models::{
    CreateDeckInput, CreateFlashcardInput, Deck, DeckStats, Flashcard, UpdateDeckInput, UpdateFlashcardInput,
};
use crate::services::deck::FavoriteStatus;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/decks/public", get(list_public_decks))
        .route("/decks/{id}", get(get_deck))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/decks", get(list_my_decks).post(create_deck))
        .route("/decks/search", get(search_decks))
        .route("/decks/favorites", get(list_favorites))
        .route("/decks/tags", get(list_tags))
        .route("/decks/stats", get(deck_stats))
        .route("/decks/{id}", axum::routing::put(update_deck).delete(delete_deck))
        .route("/decks/{id}/favorite", post(toggle_favorite))
        .route("/decks/{id}/visibility", post(toggle_visibility))
        .route("/decks/{id}/recalculate", post(recalculate))
        .route("/decks/{id}/flashcards", get(list_flashcards))
        .route("/flashcards", post(create_flashcard))
        .route(
            "/flashcards/{id}",
            get(get_flashcard).put(update_flashcard).delete(delete_flashcard),
        )
}

/// GET /api/v1/decks/public
async fn list_public_decks(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PageResponse<Deck>>, ApiError> {
    Ok(Json(state.deck_service.list_public(query.params()).await?.into()))
}

/// GET /api/v1/decks/{id}
async fn get_deck(
    State(state): State<AppState>,
    viewer: OptionalUser,
    Path(id): Path<i64>,
) -> Result<Json<Deck>, ApiError> {
    let viewer_id = viewer.as_ref().map(|u| u.id);
    Ok(Json(state.deck_service.get(viewer_id, id).await?))
}

/// GET /api/v1/decks
async fn list_my_decks(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PageResponse<Deck>>, ApiError> {
    Ok(Json(state.deck_service.list_mine(user.0.id, query.params()).await?.into()))
}

/// POST /api/v1/decks
async fn create_deck(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateDeckInput>,
) -> Result<(StatusCode, Json<Deck>), ApiError> {
    let deck = state.deck_service.create(user.0.id, body).await?;
    Ok((StatusCode::CREATED, Json(deck)))
}

/// PUT /api/v1/decks/{id}
async fn update_deck(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateDeckInput>,
) -> Result<Json<Deck>, ApiError> {
    Ok(Json(state.deck_service.update(user.0.id, id, body).await?))
}

/// DELETE /api/v1/decks/{id}
async fn delete_deck(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.deck_service.delete(user.0.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/decks/search?q=
async fn search_decks(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ListResponse<Deck>>, ApiError> {
    Ok(Json(state.deck_service.search(user.0.id, &query.q).await?.into()))
}

/// GET /api/v1/decks/favorites
async fn list_favorites(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ListResponse<Deck>>, ApiError> {
    Ok(Json(state.deck_service.favorites(user.0.id).await?.into()))
}

/// GET /api/v1/decks/tags
async fn list_tags(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ListResponse<String>>, ApiError> {
    Ok(Json(state.deck_service.tags(user.0.id).await?.into()))
}

/// GET /api/v1/decks/stats
async fn deck_stats(State(state): State<AppState>, user: AuthenticatedUser) -> Result<Json<DeckStats>, ApiError> {
    Ok(Json(state.deck_service.stats(user.0.id).await?))
}

/// POST /api/v1/decks/{id}/favorite
async fn toggle_favorite(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<FavoriteStatus>, ApiError> {
    Ok(Json(state.deck_service.toggle_favorite(user.0.id, id).await?))
}

/// POST /api/v1/decks/{id}/visibility
async fn toggle_visibility(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Deck>, ApiError> {
    Ok(Json(state.deck_service.toggle_visibility(user.0.id, id).await?))
}

/// POST /api/v1/decks/{id}/recalculate
async fn recalculate(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Deck>, ApiError> {
    Ok(Json(state.deck_service.recalculate(user.0.id, id).await?))
}

/// GET /api/v1/decks/{id}/flashcards
async fn list_flashcards(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<ListResponse<Flashcard>>, ApiError> {
    Ok(Json(state.flashcard_service.list_by_deck(user.0.id, id).await?.into()))
}

/// POST /api/v1/flashcards
async fn create_flashcard(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateFlashcardInput>,
) -> Result<(StatusCode, Json<Flashcard>), ApiError> {
    let card = state.flashcard_service.create(user.0.id, body).await?;
    Ok((StatusCode::CREATED, Json(card)))
}

/// GET /api/v1/flashcards/{id}
async fn get_flashcard(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Flashcard>, ApiError> {
    Ok(Json(state.flashcard_service.get(user.0.id, id).await?))
}

/// PUT /api/v1/flashcards/{id}
async fn update_flashcard(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateFlashcardInput>,
) -> Result<Json<Flashcard>, ApiError> {
    Ok(Json(state.flashcard_service.update(user.0.id, id, body).await?))
}

/// DELETE /api/v1/flashcards/{id}
async fn delete_flashcard(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.flashcard_service.delete(user.0.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

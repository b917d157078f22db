//! Deck service
//!
//! Ownership rules: anyone may read an active public deck, only the owner
//! may change or delete it. Per-user statistics are cached and dropped
//! whenever one of the user's decks or flashcards changes.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{DeckRepository, FlashcardRepository};
use crate::models::{
    normalize_list, CreateDeckInput, Deck, DeckStats, DeckStatus, ListParams, PagedResult, ReviewContentType,
    UpdateDeckInput,
};
use crate::services::unified_review::{UnifiedReviewError, UnifiedReviewService};
use anyhow::Context;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

const MAX_NAME_LENGTH: usize = 100;
const SEARCH_LIMIT: i64 = 50;

#[derive(Debug, thiserror::Error)]
pub enum DeckServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<UnifiedReviewError> for DeckServiceError {
    fn from(err: UnifiedReviewError) -> Self {
        match err {
            UnifiedReviewError::NotFound(msg) => DeckServiceError::NotFound(msg),
            UnifiedReviewError::ValidationError(msg) => DeckServiceError::ValidationError(msg),
            UnifiedReviewError::InternalError(e) => DeckServiceError::InternalError(e),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FavoriteStatus {
    pub deck_id: i64,
    pub is_favorite: bool,
}

pub(crate) fn stats_cache_key(user_id: i64) -> String {
    format!("deck:stats:{}", user_id)
}

pub struct DeckService {
    repo: Arc<dyn DeckRepository>,
    flashcards: Arc<dyn FlashcardRepository>,
    reviews: Arc<UnifiedReviewService>,
    cache: Arc<Cache>,
    cache_ttl: Duration,
}

impl DeckService {
    pub fn new(
        repo: Arc<dyn DeckRepository>,
        flashcards: Arc<dyn FlashcardRepository>,
        reviews: Arc<UnifiedReviewService>,
        cache: Arc<Cache>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            repo,
            flashcards,
            reviews,
            cache,
            cache_ttl,
        }
    }

    pub async fn create(&self, user_id: i64, input: CreateDeckInput) -> Result<Deck, DeckServiceError> {
        let name = validate_name(&input.name)?;
        let now = Utc::now();
        let deck = Deck {
            id: 0,
            user_id,
            name,
            description: non_empty(input.description),
            is_public: input.is_public,
            tags: normalize_list(input.tags),
            cover_image_url: non_empty(input.cover_image_url),
            status: DeckStatus::Active,
            flashcard_count: 0,
            created_at: now,
            updated_at: now,
        };

        let created = self.repo.create(&deck).await?;
        self.invalidate_stats(user_id).await;
        tracing::info!("User {} created deck {} ({})", user_id, created.id, created.name);
        Ok(created)
    }

    /// Deck readable by `viewer`: the owner's, or an active public one
    pub async fn get(&self, viewer: Option<i64>, id: i64) -> Result<Deck, DeckServiceError> {
        let deck = self.find(id).await?;
        let is_owner = viewer == Some(deck.user_id);
        if !is_owner && !(deck.is_public && deck.status == DeckStatus::Active) {
            return Err(DeckServiceError::Forbidden("Deck is private".to_string()));
        }
        Ok(deck)
    }

    /// Deck owned by `user_id`
    pub async fn get_owned(&self, user_id: i64, id: i64) -> Result<Deck, DeckServiceError> {
        let deck = self.find(id).await?;
        if deck.user_id != user_id {
            return Err(DeckServiceError::Forbidden(
                "Only the owner can change this deck".to_string(),
            ));
        }
        Ok(deck)
    }

    pub async fn update(&self, user_id: i64, id: i64, input: UpdateDeckInput) -> Result<Deck, DeckServiceError> {
        let mut deck = self.get_owned(user_id, id).await?;

        if let Some(name) = input.name {
            deck.name = validate_name(&name)?;
        }
        if let Some(description) = input.description {
            deck.description = non_empty(description);
        }
        if let Some(is_public) = input.is_public {
            deck.is_public = is_public;
        }
        if let Some(tags) = input.tags {
            deck.tags = normalize_list(tags);
        }
        if let Some(cover) = input.cover_image_url {
            deck.cover_image_url = non_empty(cover);
        }
        if let Some(status) = input.status {
            deck.status = status;
        }
        deck.updated_at = Utc::now();

        let updated = self.repo.update(&deck).await?;
        self.invalidate_stats(user_id).await;
        Ok(updated)
    }

    /// Delete a deck with its flashcards and their review items
    pub async fn delete(&self, user_id: i64, id: i64) -> Result<(), DeckServiceError> {
        let deck = self.get_owned(user_id, id).await?;
        let flashcards = self.flashcards.list_by_deck(deck.id).await?;

        self.repo.delete(deck.id).await?;
        for flashcard in flashcards {
            if let Err(e) = self
                .reviews
                .remove_content(ReviewContentType::Flashcard, flashcard.id)
                .await
            {
                tracing::warn!("Failed to drop review item of flashcard {}: {}", flashcard.id, e);
            }
        }

        self.invalidate_stats(user_id).await;
        tracing::info!("User {} deleted deck {}", user_id, deck.id);
        Ok(())
    }

    pub async fn list_mine(&self, user_id: i64, params: ListParams) -> Result<PagedResult<Deck>, DeckServiceError> {
        let params = ListParams::new(params.page, params.per_page);
        let (items, total) = self.repo.list_by_user(user_id, &params).await?;
        Ok(PagedResult::new(items, total, &params))
    }

    pub async fn list_public(&self, params: ListParams) -> Result<PagedResult<Deck>, DeckServiceError> {
        let params = ListParams::new(params.page, params.per_page);
        let (items, total) = self.repo.list_public(&params).await?;
        Ok(PagedResult::new(items, total, &params))
    }

    /// Name search over the user's decks and public decks
    pub async fn search(&self, user_id: i64, query: &str) -> Result<Vec<Deck>, DeckServiceError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.repo.search(user_id, query, SEARCH_LIMIT).await?)
    }

    pub async fn toggle_favorite(&self, user_id: i64, id: i64) -> Result<FavoriteStatus, DeckServiceError> {
        let deck = self.get(Some(user_id), id).await?;
        let is_favorite = !self.repo.is_favorite(user_id, deck.id).await?;
        self.repo.set_favorite(user_id, deck.id, is_favorite).await?;
        self.invalidate_stats(user_id).await;
        Ok(FavoriteStatus {
            deck_id: deck.id,
            is_favorite,
        })
    }

    pub async fn favorites(&self, user_id: i64) -> Result<Vec<Deck>, DeckServiceError> {
        Ok(self.repo.list_favorites(user_id).await?)
    }

    pub async fn toggle_visibility(&self, user_id: i64, id: i64) -> Result<Deck, DeckServiceError> {
        let mut deck = self.get_owned(user_id, id).await?;
        deck.is_public = !deck.is_public;
        deck.updated_at = Utc::now();
        let updated = self.repo.update(&deck).await?;
        self.invalidate_stats(user_id).await;
        Ok(updated)
    }

    pub async fn tags(&self, user_id: i64) -> Result<Vec<String>, DeckServiceError> {
        Ok(self.repo.list_tags(user_id).await?)
    }

    pub async fn stats(&self, user_id: i64) -> Result<DeckStats, DeckServiceError> {
        let key = stats_cache_key(user_id);
        if let Ok(Some(stats)) = self.cache.get::<DeckStats>(&key).await {
            return Ok(stats);
        }

        let stats = self.repo.stats(user_id).await?;
        self.cache
            .set(&key, &stats, self.cache_ttl)
            .await
            .context("Failed to cache deck stats")?;
        Ok(stats)
    }

    /// Recount the flashcards of a deck
    pub async fn recalculate(&self, user_id: i64, id: i64) -> Result<Deck, DeckServiceError> {
        let deck = self.get_owned(user_id, id).await?;
        let count = self.repo.recalculate_flashcard_count(deck.id).await?;
        self.invalidate_stats(user_id).await;
        tracing::debug!("Deck {} holds {} flashcards", deck.id, count);
        self.find(deck.id).await
    }

    async fn find(&self, id: i64) -> Result<Deck, DeckServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| DeckServiceError::NotFound(format!("deck {}", id)))
    }

    async fn invalidate_stats(&self, user_id: i64) {
        if let Err(e) = self.cache.delete(&stats_cache_key(user_id)).await {
            tracing::warn!("Failed to invalidate deck stats for user {}: {}", user_id, e);
        }
    }
}

fn validate_name(name: &str) -> Result<String, DeckServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DeckServiceError::ValidationError("Deck name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(DeckServiceError::ValidationError(format!(
            "Deck name must be at most {} characters",
            MAX_NAME_LENGTH
        )));
    }
    Ok(name.to_string())
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

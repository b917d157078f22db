//! Flashcard service
//!
//! Flashcards live in a deck owned by the same user. Creating one bumps
//! the deck counter and registers the card for review with its first tag
//! as subject; deleting undoes both.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{DeckRepository, FlashcardRepository};
use crate::models::{
    normalize_list, CreateFlashcardInput, Deck, DeckStatus, Flashcard, FlashcardStatus, NewReviewItem,
    ReviewContentType, UpdateFlashcardInput,
};
use crate::services::deck::{non_empty, stats_cache_key, DeckServiceError};
use crate::services::unified_review::UnifiedReviewService;
use chrono::Utc;
use std::sync::Arc;

pub struct FlashcardService {
    repo: Arc<dyn FlashcardRepository>,
    decks: Arc<dyn DeckRepository>,
    reviews: Arc<UnifiedReviewService>,
    cache: Arc<Cache>,
}

impl FlashcardService {
    pub fn new(
        repo: Arc<dyn FlashcardRepository>,
        decks: Arc<dyn DeckRepository>,
        reviews: Arc<UnifiedReviewService>,
        cache: Arc<Cache>,
    ) -> Self {
        Self {
            repo,
            decks,
            reviews,
            cache,
        }
    }

    pub async fn create(&self, user_id: i64, input: CreateFlashcardInput) -> Result<Flashcard, DeckServiceError> {
        let deck = self.owned_deck(user_id, input.deck_id).await?;
        let front = required(&input.front_content, "front_content")?;
        let back = required(&input.back_content, "back_content")?;

        let now = Utc::now();
        let flashcard = Flashcard {
            id: 0,
            user_id,
            deck_id: deck.id,
            front_content: front,
            back_content: back,
            personal_notes: non_empty(input.personal_notes),
            tags: normalize_list(input.tags),
            status: FlashcardStatus::Learning,
            created_at: now,
            updated_at: now,
        };
        let created = self.repo.create(&flashcard).await?;
        self.decks.adjust_flashcard_count(deck.id, 1).await?;

        let item = NewReviewItem::new(user_id, ReviewContentType::Flashcard, created.id)
            .with_deck(deck.id)
            .with_subject(created.tags.first().cloned());
        if let Err(e) = self.reviews.create_review_item(item).await {
            tracing::warn!("Failed to add flashcard {} to review: {}", created.id, e);
        }

        self.invalidate_stats(user_id).await;
        Ok(created)
    }

    /// Flashcard of the user's deck or of a public deck
    pub async fn get(&self, user_id: i64, id: i64) -> Result<Flashcard, DeckServiceError> {
        let flashcard = self.find(id).await?;
        if flashcard.user_id != user_id {
            let deck = self.find_deck(flashcard.deck_id).await?;
            if !is_shared(&deck) {
                return Err(DeckServiceError::Forbidden("Flashcard is private".to_string()));
            }
        }
        Ok(flashcard)
    }

    pub async fn update(
        &self,
        user_id: i64,
        id: i64,
        input: UpdateFlashcardInput,
    ) -> Result<Flashcard, DeckServiceError> {
        let mut flashcard = self.owned(user_id, id).await?;

        if let Some(front) = input.front_content {
            flashcard.front_content = required(&front, "front_content")?;
        }
        if let Some(back) = input.back_content {
            flashcard.back_content = required(&back, "back_content")?;
        }
        if let Some(notes) = input.personal_notes {
            flashcard.personal_notes = non_empty(notes);
        }
        if let Some(tags) = input.tags {
            flashcard.tags = normalize_list(tags);
        }
        if let Some(status) = input.status {
            flashcard.status = status;
        }
        flashcard.updated_at = Utc::now();

        Ok(self.repo.update(&flashcard).await?)
    }

    pub async fn delete(&self, user_id: i64, id: i64) -> Result<(), DeckServiceError> {
        let flashcard = self.owned(user_id, id).await?;
        self.repo.delete(flashcard.id).await?;
        self.decks.adjust_flashcard_count(flashcard.deck_id, -1).await?;
        self.reviews
            .remove_content(ReviewContentType::Flashcard, flashcard.id)
            .await?;
        self.invalidate_stats(user_id).await;
        Ok(())
    }

    pub async fn list_by_deck(&self, user_id: i64, deck_id: i64) -> Result<Vec<Flashcard>, DeckServiceError> {
        let deck = self.find_deck(deck_id).await?;
        if deck.user_id != user_id && !is_shared(&deck) {
            return Err(DeckServiceError::Forbidden("Deck is private".to_string()));
        }
        Ok(self.repo.list_by_deck(deck.id).await?)
    }

    async fn owned(&self, user_id: i64, id: i64) -> Result<Flashcard, DeckServiceError> {
        let flashcard = self.find(id).await?;
        if flashcard.user_id != user_id {
            return Err(DeckServiceError::Forbidden(
                "Only the owner can change this flashcard".to_string(),
            ));
        }
        Ok(flashcard)
    }

    async fn owned_deck(&self, user_id: i64, deck_id: i64) -> Result<Deck, DeckServiceError> {
        let deck = self.find_deck(deck_id).await?;
        if deck.user_id != user_id {
            return Err(DeckServiceError::Forbidden(
                "Flashcards can only be added to your own decks".to_string(),
            ));
        }
        Ok(deck)
    }

    async fn find(&self, id: i64) -> Result<Flashcard, DeckServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| DeckServiceError::NotFound(format!("flashcard {}", id)))
    }

    async fn find_deck(&self, id: i64) -> Result<Deck, DeckServiceError> {
        self.decks
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

fn is_shared(deck: &Deck) -> bool {
    deck.is_public && deck.status == DeckStatus::Active
}

fn required(value: &str, field: &str) -> Result<String, DeckServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DeckServiceError::ValidationError(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::test_support::{insert_user, migrated_pool};
    use crate::db::repositories::{SqlxDeckRepository, SqlxFlashcardRepository};
    use crate::models::CreateDeckInput;
    use crate::services::deck::tests::deck_service;
    use crate::services::deck::DeckService;
    use crate::services::unified_review::tests::review_service;

    struct Fixture {
        decks: DeckService,
        service: FlashcardService,
        reviews: Arc<UnifiedReviewService>,
        owner: i64,
        other: i64,
    }

    async fn setup() -> Fixture {
        let pool = migrated_pool().await;
        let owner = insert_user(&pool, "autora").await;
        let other = insert_user(&pool, "colega").await;
        let reviews = Arc::new(review_service(&pool).await);
        let cache = create_cache(&CacheConfig::default()).await.unwrap();
        Fixture {
            decks: deck_service(&pool, reviews.clone()).await,
            service: FlashcardService::new(
                SqlxFlashcardRepository::boxed(pool.clone()),
                SqlxDeckRepository::boxed(pool.clone()),
                reviews.clone(),
                cache,
            ),
            reviews,
            owner,
            other,
        }
    }

    #[tokio::test]
    async fn test_create_counts_and_registers_review() {
        let f = setup().await;
        let deck = f.decks.create(f.owner, CreateDeckInput::new("Farmaco")).await.unwrap();

        let mut input = CreateFlashcardInput::new(deck.id, "Antidoto do paracetamol?", "N-acetilcisteina");
        input.tags = vec![" toxicologia ".into()];
        let card = f.service.create(f.owner, input).await.unwrap();

        let deck = f.decks.get(Some(f.owner), deck.id).await.unwrap();
        assert_eq!(deck.flashcard_count, 1);

        let item = f
            .reviews
            .get_item(f.owner, ReviewContentType::Flashcard, card.id)
            .await
            .unwrap()
            .expect("review item should exist");
        assert_eq!(item.deck_id, Some(deck.id));
        assert_eq!(item.subject.as_deref(), Some("toxicologia"));
    }

    #[tokio::test]
    async fn test_only_deck_owner_adds_cards() {
        let f = setup().await;
        let deck = f.decks.create(f.owner, CreateDeckInput::new("Meu")).await.unwrap();

        let err = f
            .service
            .create(f.other, CreateFlashcardInput::new(deck.id, "a", "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeckServiceError::Forbidden(_)));

        let err = f
            .service
            .create(f.owner, CreateFlashcardInput::new(4242, "a", "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeckServiceError::NotFound(_)));

        let err = f
            .service
            .create(f.owner, CreateFlashcardInput::new(deck.id, " ", "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeckServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let f = setup().await;
        let deck = f.decks.create(f.owner, CreateDeckInput::new("Clinica")).await.unwrap();
        let card = f
            .service
            .create(f.owner, CreateFlashcardInput::new(deck.id, "frente", "verso"))
            .await
            .unwrap();

        let updated = f
            .service
            .update(
                f.owner,
                card.id,
                UpdateFlashcardInput {
                    back_content: Some(" novo verso ".into()),
                    status: Some(FlashcardStatus::Suspended),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.back_content, "novo verso");
        assert_eq!(updated.status, FlashcardStatus::Suspended);

        assert!(matches!(
            f.service.get(f.other, card.id).await.unwrap_err(),
            DeckServiceError::Forbidden(_)
        ));

        f.service.delete(f.owner, card.id).await.unwrap();
        assert_eq!(f.decks.get(Some(f.owner), deck.id).await.unwrap().flashcard_count, 0);
        assert!(f.service.list_by_deck(f.owner, deck.id).await.unwrap().is_empty());
        assert!(f
            .reviews
            .get_item(f.owner, ReviewContentType::Flashcard, card.id)
            .await
            .unwrap()
            .is_none());
    }
}

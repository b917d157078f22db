//! Unified review service
//!
//! One spaced-repetition queue for flashcards, questions and error notes.
//! Items are registered once per (user, content type, content id); every
//! review runs the FSRS scheduler, stores the new card state and appends a
//! log plus a history entry.
//!
//! The daily summary is cached per user and day, and dropped whenever the
//! user's queue changes.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{DeckRepository, ReviewRepository};
use crate::models::{
    DueCursor, DuePage, DueQuery, FsrsCard, Grade, NewReviewItem, ReviewContentType, ReviewHistoryEntry, ReviewLog,
};
use crate::services::fsrs::{FsrsScheduler, SchedulingCards};
use anyhow::Context;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use data_encoding::BASE64URL_NOPAD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Cap of the due and completed lists
pub const DUE_LIMIT: i64 = 200;

/// Cap of the today list
pub const TODAY_LIMIT: i64 = 50;

/// Days looked back by `completed` when none are given
pub const DEFAULT_COMPLETED_DAYS: i64 = 7;

/// Items shown in the summary
const SUMMARY_ITEMS: usize = 20;

/// Cards scanned when building the summary
const SUMMARY_SCAN_LIMIT: i64 = 5000;

const DEFAULT_SUMMARY_TTL_SECS: u64 = 300;

const CURSOR_PREFIX: &str = "card:";

#[derive(Debug, thiserror::Error)]
pub enum UnifiedReviewError {
    #[error("Review item not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Result of recording a review
#[derive(Debug, Clone, Serialize)]
pub struct ReviewOutcome {
    pub card: FsrsCard,
    pub log: ReviewLog,
    pub history: ReviewHistoryEntry,
}

/// Count of due items under one label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryBucket {
    pub key: String,
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryBreakdown {
    pub by_deck: Vec<SummaryBucket>,
    pub by_subject: Vec<SummaryBucket>,
    pub by_difficulty: Vec<SummaryBucket>,
}

/// What is waiting for the user today
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DailySummary {
    pub total_items: i64,
    pub today_items: i64,
    pub old_items: i64,
    pub flashcards: i64,
    pub questions: i64,
    pub error_notes: i64,
    pub estimated_time_minutes: i64,
    pub breakdown: SummaryBreakdown,
    pub items: Vec<FsrsCard>,
}

/// Paginated due query as received from clients
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DuePageRequest {
    pub page_size: Option<u32>,
    pub cursor: Option<String>,
    pub due_only: Option<bool>,
    pub content_type: Option<ReviewContentType>,
    pub deck_id: Option<i64>,
}

pub struct UnifiedReviewService {
    repo: Arc<dyn ReviewRepository>,
    decks: Arc<dyn DeckRepository>,
    cache: Arc<Cache>,
    scheduler: FsrsScheduler,
    summary_ttl: std::time::Duration,
}

impl UnifiedReviewService {
    pub fn new(
        repo: Arc<dyn ReviewRepository>,
        decks: Arc<dyn DeckRepository>,
        cache: Arc<Cache>,
        scheduler: FsrsScheduler,
    ) -> Self {
        Self {
            repo,
            decks,
            cache,
            scheduler,
            summary_ttl: std::time::Duration::from_secs(DEFAULT_SUMMARY_TTL_SECS),
        }
    }

    pub fn with_summary_ttl(mut self, ttl: std::time::Duration) -> Self {
        self.summary_ttl = ttl;
        self
    }

    pub fn scheduler(&self) -> &FsrsScheduler {
        &self.scheduler
    }

    /// Register an item for review.
    ///
    /// Registering the same item twice returns the existing card.
    pub async fn create_review_item(&self, item: NewReviewItem) -> Result<FsrsCard, UnifiedReviewError> {
        if let Some(existing) = self
            .repo
            .find_card(item.user_id, item.content_type, item.content_id)
            .await?
        {
            tracing::debug!(
                "Review item already exists for {} {} (user {})",
                item.content_type,
                item.content_id,
                item.user_id
            );
            return Ok(existing);
        }

        let mut card = self
            .scheduler
            .new_card(item.user_id, item.content_type, item.content_id, Utc::now());
        card.deck_id = item.deck_id;
        card.subject = item.subject;

        let created = self.repo.create_card(&card).await?;
        self.invalidate_summary(item.user_id).await;
        tracing::info!(
            "Added {} {} to review queue of user {}",
            created.content_type,
            created.content_id,
            created.user_id
        );
        Ok(created)
    }

    /// Stop reviewing a content for every user
    pub async fn remove_content(
        &self,
        content_type: ReviewContentType,
        content_id: i64,
    ) -> Result<(), UnifiedReviewError> {
        self.repo.delete_cards_for(content_type, content_id).await?;
        self.cache
            .delete_pattern("review:summary:*")
            .await
            .context("Failed to invalidate review summaries")?;
        Ok(())
    }

    /// Card of one item, if registered
    pub async fn get_item(
        &self,
        user_id: i64,
        content_type: ReviewContentType,
        content_id: i64,
    ) -> Result<Option<FsrsCard>, UnifiedReviewError> {
        Ok(self.repo.find_card(user_id, content_type, content_id).await?)
    }

    /// Items due now, earliest first
    pub async fn due(&self, user_id: i64, now: DateTime<Utc>) -> Result<Vec<FsrsCard>, UnifiedReviewError> {
        Ok(self.repo.cards_due_before(user_id, now, DUE_LIMIT).await?)
    }

    /// Items due before the end of today
    pub async fn today(&self, user_id: i64, now: DateTime<Utc>) -> Result<Vec<FsrsCard>, UnifiedReviewError> {
        let (_, end) = day_bounds(now);
        Ok(self
            .repo
            .cards_due_before(user_id, end - Duration::milliseconds(1), TODAY_LIMIT)
            .await?)
    }

    /// Items due from tomorrow on
    pub async fn future(&self, user_id: i64, now: DateTime<Utc>) -> Result<Vec<FsrsCard>, UnifiedReviewError> {
        let (_, tomorrow) = day_bounds(now);
        Ok(self.repo.cards_due_from(user_id, tomorrow, DUE_LIMIT).await?)
    }

    /// Items due in `[start, end)`, for calendar views
    pub async fn due_between(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<FsrsCard>, UnifiedReviewError> {
        if end <= start {
            return Err(UnifiedReviewError::ValidationError(
                "end must be after start".to_string(),
            ));
        }
        Ok(self.repo.cards_due_between(user_id, start, end).await?)
    }

    /// Items reviewed within the last `days` days
    pub async fn completed(
        &self,
        user_id: i64,
        days: Option<i64>,
        content_type: Option<ReviewContentType>,
        now: DateTime<Utc>,
    ) -> Result<Vec<FsrsCard>, UnifiedReviewError> {
        let days = days.unwrap_or(DEFAULT_COMPLETED_DAYS);
        if days <= 0 {
            return Err(UnifiedReviewError::ValidationError(
                "days must be a positive number".to_string(),
            ));
        }
        let since = now - Duration::days(days);
        Ok(self
            .repo
            .cards_reviewed_since(user_id, since, content_type, DUE_LIMIT)
            .await?)
    }

    /// Keyset-paginated listing of the user's cards, earliest due first
    pub async fn due_page(
        &self,
        user_id: i64,
        request: DuePageRequest,
        now: DateTime<Utc>,
    ) -> Result<DuePage, UnifiedReviewError> {
        let defaults = DueQuery::default();
        let cursor = request.cursor.as_deref().map(decode_cursor).transpose()?;
        let query = DueQuery {
            page_size: request.page_size.unwrap_or(defaults.page_size).clamp(1, 100),
            cursor,
            due_only: request.due_only.unwrap_or(defaults.due_only),
            content_type: request.content_type,
            deck_id: request.deck_id,
        };

        let mut items = self.repo.cards_page(user_id, &query, now).await?;
        let has_more = items.len() > query.page_size as usize;
        items.truncate(query.page_size as usize);
        let next_cursor = if has_more {
            items.last().map(|card| encode_cursor(DueCursor::from(card)))
        } else {
            None
        };

        Ok(DuePage {
            items,
            next_cursor,
            has_more,
        })
    }

    /// Record a review with a client grade in 0..=3
    pub async fn record(
        &self,
        user_id: i64,
        content_type: ReviewContentType,
        content_id: i64,
        grade: i64,
        review_time_ms: i64,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome, UnifiedReviewError> {
        let grade = Grade::from_client(grade)
            .ok_or_else(|| UnifiedReviewError::ValidationError(format!("Invalid grade: {}", grade)))?;

        let card = self
            .repo
            .find_card(user_id, content_type, content_id)
            .await?
            .ok_or_else(|| UnifiedReviewError::NotFound(format!("{} {}", content_type, content_id)))?;

        let info = self.scheduler.review(&card, grade, now, review_time_ms);
        self.repo.update_card(&info.card).await?;
        let log = self.repo.insert_log(&info.log).await?;

        let history = self
            .repo
            .insert_history(&ReviewHistoryEntry {
                id: 0,
                user_id,
                card_id: info.card.id,
                content_type,
                content_id,
                grade,
                state: info.card.state,
                stability: info.card.stability,
                difficulty: info.card.difficulty,
                scheduled_days: info.card.scheduled_days,
                review_time_ms: log.review_time_ms,
                reviewed_at: now,
            })
            .await?;

        self.invalidate_summary(user_id).await;
        tracing::debug!(
            "Recorded {:?} for {} {} (user {}), next due {}",
            grade,
            content_type,
            content_id,
            user_id,
            info.card.due
        );

        Ok(ReviewOutcome {
            card: info.card,
            log,
            history,
        })
    }

    /// Outcomes of every grade without saving anything
    pub async fn preview(
        &self,
        user_id: i64,
        content_type: ReviewContentType,
        content_id: i64,
        now: DateTime<Utc>,
    ) -> Result<SchedulingCards, UnifiedReviewError> {
        let card = self
            .repo
            .find_card(user_id, content_type, content_id)
            .await?
            .ok_or_else(|| UnifiedReviewError::NotFound(format!("{} {}", content_type, content_id)))?;
        Ok(self.scheduler.schedule(&card, now))
    }

    /// Review history of one item, most recent first
    pub async fn history(
        &self,
        user_id: i64,
        content_type: ReviewContentType,
        content_id: i64,
    ) -> Result<Vec<ReviewHistoryEntry>, UnifiedReviewError> {
        Ok(self.repo.history_for(user_id, content_type, content_id).await?)
    }

    /// Workload for the day containing `now`
    pub async fn daily_summary(&self, user_id: i64, now: DateTime<Utc>) -> Result<DailySummary, UnifiedReviewError> {
        let key = format!("review:summary:{}:{}", user_id, now.date_naive());
        if let Ok(Some(cached)) = self.cache.get::<DailySummary>(&key).await {
            return Ok(cached);
        }

        let (start, end) = day_bounds(now);
        let pending = self
            .repo
            .cards_due_before(user_id, end - Duration::milliseconds(1), SUMMARY_SCAN_LIMIT)
            .await?;

        let mut summary = summarize(&pending, start);
        summary.breakdown.by_deck = self.deck_breakdown(&pending).await?;

        if let Err(e) = self.cache.set(&key, &summary, self.summary_ttl).await {
            tracing::warn!("Failed to cache review summary: {}", e);
        }
        Ok(summary)
    }

    async fn deck_breakdown(&self, cards: &[FsrsCard]) -> Result<Vec<SummaryBucket>, UnifiedReviewError> {
        let mut counts: BTreeMap<i64, i64> = BTreeMap::new();
        for deck_id in cards.iter().filter_map(|c| c.deck_id) {
            *counts.entry(deck_id).or_default() += 1;
        }

        let mut buckets = Vec::with_capacity(counts.len());
        for (deck_id, count) in counts {
            let name = self
                .decks
                .get_by_id(deck_id)
                .await?
                .map(|deck| deck.name)
                .unwrap_or_else(|| format!("Deck {}", deck_id));
            buckets.push(SummaryBucket {
                key: deck_id.to_string(),
                name,
                count,
            });
        }
        buckets.sort_by(|a, b| b.count.cmp(&a.count));
        Ok(buckets)
    }

    async fn invalidate_summary(&self, user_id: i64) {
        let pattern = format!("review:summary:{}:*", user_id);
        if let Err(e) = self.cache.delete_pattern(&pattern).await {
            tracing::warn!("Failed to invalidate review summary for user {}: {}", user_id, e);
        }
    }
}

/// Counts and buckets over the pending cards; decks are filled in separately
fn summarize(pending: &[FsrsCard], start_of_day: DateTime<Utc>) -> DailySummary {
    let mut summary = DailySummary {
        total_items: pending.len() as i64,
        ..DailySummary::default()
    };

    let mut subjects: BTreeMap<String, i64> = BTreeMap::new();
    let mut difficulty: BTreeMap<&'static str, i64> = BTreeMap::new();

    for card in pending {
        if card.due >= start_of_day {
            summary.today_items += 1;
        } else {
            summary.old_items += 1;
        }
        match card.content_type {
            ReviewContentType::Flashcard => summary.flashcards += 1,
            ReviewContentType::Question => summary.questions += 1,
            ReviewContentType::ErrorNotebook => summary.error_notes += 1,
        }
        if let Some(subject) = card.subject.as_deref().filter(|s| !s.trim().is_empty()) {
            *subjects.entry(subject.trim().to_string()).or_default() += 1;
        }
        *difficulty.entry(difficulty_bucket(card.difficulty)).or_default() += 1;
    }

    summary.estimated_time_minutes = estimated_minutes(summary.flashcards, summary.questions, summary.error_notes);

    let mut by_subject: Vec<SummaryBucket> = subjects
        .into_iter()
        .map(|(name, count)| SummaryBucket {
            key: name.clone(),
            name,
            count,
        })
        .collect();
    by_subject.sort_by(|a, b| b.count.cmp(&a.count));
    summary.breakdown.by_subject = by_subject;

    summary.breakdown.by_difficulty = ["Fácil", "Médio", "Difícil"]
        .into_iter()
        .filter_map(|name| {
            difficulty.get(name).map(|count| SummaryBucket {
                key: name.to_string(),
                name: name.to_string(),
                count: *count,
            })
        })
        .collect();

    summary.items = pending
        .iter()
        .filter(|c| c.due >= start_of_day)
        .take(SUMMARY_ITEMS)
        .cloned()
        .collect();

    summary
}

fn estimated_minutes(flashcards: i64, questions: i64, error_notes: i64) -> i64 {
    (flashcards as f64 * 1.5 + questions as f64 * 2.5 + error_notes as f64 * 2.0).round() as i64
}

fn difficulty_bucket(difficulty: f64) -> &'static str {
    if difficulty < 3.0 {
        "Fácil"
    } else if difficulty > 7.0 {
        "Difícil"
    } else {
        "Médio"
    }
}

/// Start of the UTC day containing `now` and start of the next one
fn day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

/// `card:<seconds>.<nanos>:<id>` in base64url
fn encode_cursor(cursor: DueCursor) -> String {
    let text = format!(
        "{}{}.{}:{}",
        CURSOR_PREFIX,
        cursor.due.timestamp(),
        cursor.due.timestamp_subsec_nanos(),
        cursor.id
    );
    BASE64URL_NOPAD.encode(text.as_bytes())
}

fn decode_cursor(cursor: &str) -> Result<DueCursor, UnifiedReviewError> {
    let invalid = || UnifiedReviewError::ValidationError("Invalid cursor".to_string());
    let bytes = BASE64URL_NOPAD.decode(cursor.trim().as_bytes()).map_err(|_| invalid())?;
    let text = String::from_utf8(bytes).map_err(|_| invalid())?;
    let (due, id) = text
        .strip_prefix(CURSOR_PREFIX)
        .and_then(|rest| rest.split_once(':'))
        .ok_or_else(invalid)?;
    let (secs, nanos) = due.split_once('.').ok_or_else(invalid)?;
    let due = match (secs.parse::<i64>(), nanos.parse::<u32>()) {
        (Ok(secs), Ok(nanos)) => DateTime::from_timestamp(secs, nanos).ok_or_else(invalid)?,
        _ => return Err(invalid()),
    };
    let id = id.parse::<i64>().ok().filter(|id| *id >= 0).ok_or_else(invalid)?;
    Ok(DueCursor { due, id })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::deck::tests::new_deck;
    use crate::db::repositories::test_support::{insert_user, migrated_pool};
    use crate::db::repositories::{DeckRepository, SqlxDeckRepository, SqlxReviewRepository};
    use crate::db::DynDatabasePool;
    use crate::models::CardState;
    use chrono::TimeZone;
    use proptest::prelude::*;

    pub(crate) async fn review_service(pool: &DynDatabasePool) -> UnifiedReviewService {
        let cache = create_cache(&CacheConfig::default()).await.unwrap();
        UnifiedReviewService::new(
            SqlxReviewRepository::boxed(pool.clone()),
            SqlxDeckRepository::boxed(pool.clone()),
            cache,
            FsrsScheduler::default(),
        )
    }

    async fn setup() -> (UnifiedReviewService, DynDatabasePool, i64) {
        let pool = migrated_pool().await;
        let user = insert_user(&pool, "residente").await;
        (review_service(&pool).await, pool, user)
    }

    #[tokio::test]
    async fn test_create_review_item_is_idempotent() {
        let (service, _pool, user) = setup().await;

        let first = service
            .create_review_item(NewReviewItem::new(user, ReviewContentType::Question, 42))
            .await
            .unwrap();
        let second = service
            .create_review_item(NewReviewItem::new(user, ReviewContentType::Question, 42))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.state, CardState::New);
        assert_eq!(service.due(user, Utc::now()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_record_review_moves_card_forward() {
        let (service, _pool, user) = setup().await;
        service
            .create_review_item(NewReviewItem::new(user, ReviewContentType::Flashcard, 7))
            .await
            .unwrap();

        let now = Utc::now();
        let outcome = service
            .record(user, ReviewContentType::Flashcard, 7, 2, 3200, now)
            .await
            .unwrap();

        assert_eq!(outcome.card.state, CardState::Learning);
        assert_eq!(outcome.card.scheduled_days, 3);
        assert_eq!(outcome.log.state, CardState::New);
        assert_eq!(outcome.history.grade, Grade::Good);
        assert!(service.due(user, now).await.unwrap().is_empty());
        assert_eq!(service.future(user, now).await.unwrap().len(), 1);

        let history = service.history(user, ReviewContentType::Flashcard, 7).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].review_time_ms, 3200);

        let completed = service.completed(user, None, None, now).await.unwrap();
        assert_eq!(completed.len(), 1);
    }

    #[tokio::test]
    async fn test_record_validates_grade_and_item() {
        let (service, _pool, user) = setup().await;

        let err = service
            .record(user, ReviewContentType::Question, 1, 4, 0, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, UnifiedReviewError::ValidationError(_)));

        let err = service
            .record(user, ReviewContentType::Question, 1, 0, 0, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, UnifiedReviewError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_due_page_walks_with_cursor() {
        let (service, _pool, user) = setup().await;
        for content_id in 1..=5 {
            service
                .create_review_item(NewReviewItem::new(user, ReviewContentType::Question, content_id))
                .await
                .unwrap();
        }

        let now = Utc::now() + Duration::seconds(1);
        let first = service
            .due_page(
                user,
                DuePageRequest {
                    page_size: Some(2),
                    ..Default::default()
                },
                now,
            )
            .await
            .unwrap();
        assert_eq!(first.items.len(), 2);
        assert!(first.has_more);

        let mut seen: Vec<i64> = first.items.iter().map(|c| c.content_id).collect();
        let mut cursor = first.next_cursor;
        while let Some(next) = cursor {
            let page = service
                .due_page(
                    user,
                    DuePageRequest {
                        page_size: Some(2),
                        cursor: Some(next),
                        ..Default::default()
                    },
                    now,
                )
                .await
                .unwrap();
            seen.extend(page.items.iter().map(|c| c.content_id));
            cursor = page.next_cursor;
        }
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_due_page_orders_by_due_date() {
        let (service, _pool, user) = setup().await;
        for content_id in 1..=3 {
            service
                .create_review_item(NewReviewItem::new(user, ReviewContentType::Question, content_id))
                .await
                .unwrap();
        }
        // Pushes the first item three days out, behind the other two
        let now = Utc::now();
        service
            .record(user, ReviewContentType::Question, 1, 2, 0, now)
            .await
            .unwrap();

        let request = || DuePageRequest {
            page_size: Some(2),
            due_only: Some(false),
            ..Default::default()
        };
        let first = service.due_page(user, request(), now).await.unwrap();
        assert_eq!(first.items.iter().map(|c| c.content_id).collect::<Vec<_>>(), vec![2, 3]);
        assert!(first.has_more);

        let second = service
            .due_page(
                user,
                DuePageRequest {
                    cursor: first.next_cursor,
                    ..request()
                },
                now,
            )
            .await
            .unwrap();
        assert_eq!(second.items.iter().map(|c| c.content_id).collect::<Vec<_>>(), vec![1]);
        assert!(!second.has_more);
        assert!(first.items[1].due <= second.items[0].due);
    }

    #[tokio::test]
    async fn test_due_page_rejects_garbage_cursor() {
        let (service, _pool, user) = setup().await;
        let err = service
            .due_page(
                user,
                DuePageRequest {
                    cursor: Some("%%%".to_string()),
                    ..Default::default()
                },
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, UnifiedReviewError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_daily_summary_counts_and_invalidation() {
        let (service, pool, user) = setup().await;
        let deck = SqlxDeckRepository::new(pool.clone())
            .create(&new_deck(user, "Cardiologia", false, &[]))
            .await
            .unwrap();

        service
            .create_review_item(
                NewReviewItem::new(user, ReviewContentType::Flashcard, 1)
                    .with_deck(deck.id)
                    .with_subject(Some("cardio".into())),
            )
            .await
            .unwrap();
        service
            .create_review_item(NewReviewItem::new(user, ReviewContentType::Question, 2))
            .await
            .unwrap();

        let now = Utc::now();
        let summary = service.daily_summary(user, now).await.unwrap();
        assert_eq!(summary.total_items, 2);
        assert_eq!(summary.flashcards, 1);
        assert_eq!(summary.questions, 1);
        assert_eq!(summary.estimated_time_minutes, 4);
        assert_eq!(summary.breakdown.by_deck[0].name, "Cardiologia");
        assert_eq!(summary.breakdown.by_subject[0].name, "cardio");
        assert_eq!(summary.breakdown.by_difficulty[0].name, "Médio");

        service
            .record(user, ReviewContentType::Question, 2, 3, 0, now)
            .await
            .unwrap();
        let refreshed = service.daily_summary(user, now).await.unwrap();
        assert_eq!(refreshed.total_items, 1);
    }

    fn card_due(due: DateTime<Utc>, content_type: ReviewContentType, difficulty: f64) -> FsrsCard {
        let mut card = FsrsScheduler::default().new_card(1, content_type, 1, due);
        card.difficulty = difficulty;
        card
    }

    #[test]
    fn test_summarize_splits_old_and_today() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 15, 0, 0).unwrap();
        let (start, _) = day_bounds(now);
        let pending = vec![
            card_due(now - Duration::days(2), ReviewContentType::ErrorNotebook, 8.0),
            card_due(start, ReviewContentType::Flashcard, 2.0),
            card_due(now, ReviewContentType::Flashcard, 5.0),
        ];

        let summary = summarize(&pending, start);
        assert_eq!(summary.old_items, 1);
        assert_eq!(summary.today_items, 2);
        assert_eq!(summary.items.len(), 2);
        assert_eq!(summary.estimated_time_minutes, 5);
        let names: Vec<&str> = summary.breakdown.by_difficulty.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["Fácil", "Médio", "Difícil"]);
    }

    #[test]
    fn test_difficulty_bucket_edges() {
        assert_eq!(difficulty_bucket(2.99), "Fácil");
        assert_eq!(difficulty_bucket(3.0), "Médio");
        assert_eq!(difficulty_bucket(7.0), "Médio");
        assert_eq!(difficulty_bucket(7.01), "Difícil");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn prop_cursor_roundtrip(
            id in 0i64..i64::MAX,
            secs in 0i64..4_000_000_000,
            nanos in 0u32..1_000_000_000,
        ) {
            let cursor = DueCursor { due: DateTime::from_timestamp(secs, nanos).unwrap(), id };
            prop_assert_eq!(decode_cursor(&encode_cursor(cursor)).unwrap(), cursor);
        }

        #[test]
        fn prop_estimated_minutes_is_monotonic(f in 0i64..500, q in 0i64..500, e in 0i64..500) {
            let base = estimated_minutes(f, q, e);
            prop_assert!(estimated_minutes(f + 1, q, e) >= base);
            prop_assert!(estimated_minutes(f, q + 1, e) >= base);
            prop_assert!(estimated_minutes(f, q, e + 1) >= base);
        }
    }
}

//! Review repository
//!
//! Storage for spaced-repetition cards, their review logs and the user's
//! review history.

use super::{Conditions, DbRow, InsertId, SqlArg};
use crate::db::DynDatabasePool;
use crate::models::{DueQuery, FsrsCard, Grade, ReviewContentType, ReviewHistoryEntry, ReviewLog};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

const CARD_COLUMNS: &str = "id, user_id, content_type, content_id, deck_id, subject, due, stability, difficulty, \
     elapsed_days, scheduled_days, reps, lapses, state, last_review, created_at, updated_at";

const HISTORY_COLUMNS: &str = "id, user_id, card_id, content_type, content_id, grade, state, stability, difficulty, \
     scheduled_days, review_time_ms, reviewed_at";

/// Review repository trait
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Insert a card; `id` on the argument is ignored
    async fn create_card(&self, card: &FsrsCard) -> Result<FsrsCard>;

    /// Get card by ID
    async fn get_card(&self, id: i64) -> Result<Option<FsrsCard>>;

    /// Card tracking one (user, content type, content) item
    async fn find_card(
        &self,
        user_id: i64,
        content_type: ReviewContentType,
        content_id: i64,
    ) -> Result<Option<FsrsCard>>;

    /// Persist the scheduling state of a card
    async fn update_card(&self, card: &FsrsCard) -> Result<()>;

    /// Remove every card for a content, across users
    async fn delete_cards_for(&self, content_type: ReviewContentType, content_id: i64) -> Result<()>;

    /// Cards due at or before `until`, earliest first
    async fn cards_due_before(&self, user_id: i64, until: DateTime<Utc>, limit: i64) -> Result<Vec<FsrsCard>>;

    /// Cards due at or after `from`, earliest first
    async fn cards_due_from(&self, user_id: i64, from: DateTime<Utc>, limit: i64) -> Result<Vec<FsrsCard>>;

    /// Cards due in `[start, end)`, earliest first
    async fn cards_due_between(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<FsrsCard>>;

    /// Keyset page ordered by `due ASC, id ASC`; fetches up to `page_size + 1` rows
    async fn cards_page(&self, user_id: i64, query: &DueQuery, now: DateTime<Utc>) -> Result<Vec<FsrsCard>>;

    /// Cards reviewed at or after `since`, most recent first
    async fn cards_reviewed_since(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
        content_type: Option<ReviewContentType>,
        limit: i64,
    ) -> Result<Vec<FsrsCard>>;

    /// Append a review log
    async fn insert_log(&self, log: &ReviewLog) -> Result<ReviewLog>;

    /// Logs of a card, oldest first
    async fn logs_for_card(&self, card_id: i64) -> Result<Vec<ReviewLog>>;

    /// Append a history entry
    async fn insert_history(&self, entry: &ReviewHistoryEntry) -> Result<ReviewHistoryEntry>;

    /// History of one item, most recent first
    async fn history_for(
        &self,
        user_id: i64,
        content_type: ReviewContentType,
        content_id: i64,
    ) -> Result<Vec<ReviewHistoryEntry>>;
}

/// SQLx-based review repository implementation
pub struct SqlxReviewRepository {
    pool: DynDatabasePool,
}

impl SqlxReviewRepository {
    /// Create a new SQLx review repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ReviewRepository> {
        Arc::new(Self::new(pool))
    }

    async fn select_cards(&self, conditions: &Conditions, order: &str, limit: Option<i64>) -> Result<Vec<FsrsCard>> {
        let mut sql = format!(
            "SELECT {} FROM fsrs_cards {} ORDER BY {}",
            CARD_COLUMNS,
            conditions.where_sql(),
            order
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit.max(0)));
        }

        on_pool!(self.pool, |pool, Db| {
            let rows = bind_args!(sqlx::query::<Db>(&sql), conditions.args)
                .fetch_all(pool)
                .await
                .context("Failed to query review cards")?;
            rows.iter().map(row_to_card).collect()
        })
    }
}

fn user_condition(user_id: i64) -> Conditions {
    let mut conditions = Conditions::new();
    conditions.push("user_id = ?", [SqlArg::Int(user_id)]);
    conditions
}

#[async_trait]
impl ReviewRepository for SqlxReviewRepository {
    async fn create_card(&self, card: &FsrsCard) -> Result<FsrsCard> {
        let id = on_pool!(self.pool, |pool, Db| {
            sqlx::query(
                r#"
                INSERT INTO fsrs_cards (user_id, content_type, content_id, deck_id, subject, due, stability,
                                        difficulty, elapsed_days, scheduled_days, reps, lapses, state, last_review,
                                        created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(card.user_id)
            .bind(card.content_type.as_str())
            .bind(card.content_id)
            .bind(card.deck_id)
            .bind(&card.subject)
            .bind(card.due)
            .bind(card.stability)
            .bind(card.difficulty)
            .bind(card.elapsed_days)
            .bind(card.scheduled_days)
            .bind(card.reps)
            .bind(card.lapses)
            .bind(card.state.as_str())
            .bind(card.last_review)
            .bind(card.created_at)
            .bind(card.updated_at)
            .execute(pool)
            .await
            .context("Failed to create review card")?
            .insert_id()
        });

        self.get_card(id).await?.context("Failed to fetch created review card")
    }

    async fn get_card(&self, id: i64) -> Result<Option<FsrsCard>> {
        on_pool!(self.pool, |pool, Db| {
            let sql = format!("SELECT {} FROM fsrs_cards WHERE id = ?", CARD_COLUMNS);
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get review card")?;
            row.as_ref().map(row_to_card).transpose()
        })
    }

    async fn find_card(
        &self,
        user_id: i64,
        content_type: ReviewContentType,
        content_id: i64,
    ) -> Result<Option<FsrsCard>> {
        on_pool!(self.pool, |pool, Db| {
            let sql = format!(
                "SELECT {} FROM fsrs_cards WHERE user_id = ? AND content_type = ? AND content_id = ?",
                CARD_COLUMNS
            );
            let row = sqlx::query(&sql)
                .bind(user_id)
                .bind(content_type.as_str())
                .bind(content_id)
                .fetch_optional(pool)
                .await
                .context("Failed to find review card")?;
            row.as_ref().map(row_to_card).transpose()
        })
    }

    async fn update_card(&self, card: &FsrsCard) -> Result<()> {
        on_pool!(self.pool, |pool, Db| {
            sqlx::query(
                r#"
                UPDATE fsrs_cards
                SET due = ?, stability = ?, difficulty = ?, elapsed_days = ?, scheduled_days = ?, reps = ?,
                    lapses = ?, state = ?, last_review = ?, subject = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(card.due)
            .bind(card.stability)
            .bind(card.difficulty)
            .bind(card.elapsed_days)
            .bind(card.scheduled_days)
            .bind(card.reps)
            .bind(card.lapses)
            .bind(card.state.as_str())
            .bind(card.last_review)
            .bind(&card.subject)
            .bind(card.updated_at)
            .bind(card.id)
            .execute(pool)
            .await
            .context("Failed to update review card")?;
        });
        Ok(())
    }

    async fn delete_cards_for(&self, content_type: ReviewContentType, content_id: i64) -> Result<()> {
        on_pool!(self.pool, |pool, Db| {
            sqlx::query("DELETE FROM fsrs_cards WHERE content_type = ? AND content_id = ?")
                .bind(content_type.as_str())
                .bind(content_id)
                .execute(pool)
                .await
                .context("Failed to delete review cards")?;
        });
        Ok(())
    }

    async fn cards_due_before(&self, user_id: i64, until: DateTime<Utc>, limit: i64) -> Result<Vec<FsrsCard>> {
        let mut conditions = user_condition(user_id);
        conditions.push("due <= ?", [SqlArg::Time(until)]);
        self.select_cards(&conditions, "due ASC, id ASC", Some(limit)).await
    }

    async fn cards_due_from(&self, user_id: i64, from: DateTime<Utc>, limit: i64) -> Result<Vec<FsrsCard>> {
        let mut conditions = user_condition(user_id);
        conditions.push("due >= ?", [SqlArg::Time(from)]);
        self.select_cards(&conditions, "due ASC, id ASC", Some(limit)).await
    }

    async fn cards_due_between(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<FsrsCard>> {
        let mut conditions = user_condition(user_id);
        conditions.push("due >= ? AND due < ?", [SqlArg::Time(start), SqlArg::Time(end)]);
        self.select_cards(&conditions, "due ASC, id ASC", None).await
    }

    async fn cards_page(&self, user_id: i64, query: &DueQuery, now: DateTime<Utc>) -> Result<Vec<FsrsCard>> {
        let mut conditions = user_condition(user_id);
        if let Some(cursor) = query.cursor {
            conditions.push(
                "(due > ? OR (due = ? AND id > ?))",
                [SqlArg::Time(cursor.due), SqlArg::Time(cursor.due), SqlArg::Int(cursor.id)],
            );
        }
        if query.due_only {
            conditions.push("due <= ?", [SqlArg::Time(now)]);
        }
        if let Some(content_type) = query.content_type {
            conditions.push("content_type = ?", [SqlArg::Text(content_type.as_str().to_string())]);
        }
        if let Some(deck_id) = query.deck_id {
            conditions.push("deck_id = ?", [SqlArg::Int(deck_id)]);
        }
        self.select_cards(&conditions, "due ASC, id ASC", Some(query.page_size as i64 + 1))
            .await
    }

    async fn cards_reviewed_since(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
        content_type: Option<ReviewContentType>,
        limit: i64,
    ) -> Result<Vec<FsrsCard>> {
        let mut conditions = user_condition(user_id);
        conditions.push("last_review >= ?", [SqlArg::Time(since)]);
        if let Some(content_type) = content_type {
            conditions.push("content_type = ?", [SqlArg::Text(content_type.as_str().to_string())]);
        }
        self.select_cards(&conditions, "last_review DESC, id DESC", Some(limit))
            .await
    }

    async fn insert_log(&self, log: &ReviewLog) -> Result<ReviewLog> {
        let id = on_pool!(self.pool, |pool, Db| {
            sqlx::query(
                r#"
                INSERT INTO fsrs_review_logs (card_id, grade, state, due, stability, difficulty, elapsed_days,
                                              last_elapsed_days, scheduled_days, review_time_ms, reviewed_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(log.card_id)
            .bind(log.grade.value())
            .bind(log.state.as_str())
            .bind(log.due)
            .bind(log.stability)
            .bind(log.difficulty)
            .bind(log.elapsed_days)
            .bind(log.last_elapsed_days)
            .bind(log.scheduled_days)
            .bind(log.review_time_ms)
            .bind(log.reviewed_at)
            .execute(pool)
            .await
            .context("Failed to insert review log")?
            .insert_id()
        });

        Ok(ReviewLog { id, ..log.clone() })
    }

    async fn logs_for_card(&self, card_id: i64) -> Result<Vec<ReviewLog>> {
        on_pool!(self.pool, |pool, Db| {
            let rows = sqlx::query(
                r#"
                SELECT id, card_id, grade, state, due, stability, difficulty, elapsed_days, last_elapsed_days,
                       scheduled_days, review_time_ms, reviewed_at
                FROM fsrs_review_logs WHERE card_id = ? ORDER BY reviewed_at ASC, id ASC
                "#,
            )
            .bind(card_id)
            .fetch_all(pool)
            .await
            .context("Failed to list review logs")?;
            rows.iter().map(row_to_log).collect()
        })
    }

    async fn insert_history(&self, entry: &ReviewHistoryEntry) -> Result<ReviewHistoryEntry> {
        let id = on_pool!(self.pool, |pool, Db| {
            sqlx::query(
                r#"
                INSERT INTO review_history (user_id, card_id, content_type, content_id, grade, state, stability,
                                            difficulty, scheduled_days, review_time_ms, reviewed_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(entry.user_id)
            .bind(entry.card_id)
            .bind(entry.content_type.as_str())
            .bind(entry.content_id)
            .bind(entry.grade.value())
            .bind(entry.state.as_str())
            .bind(entry.stability)
            .bind(entry.difficulty)
            .bind(entry.scheduled_days)
            .bind(entry.review_time_ms)
            .bind(entry.reviewed_at)
            .execute(pool)
            .await
            .context("Failed to insert review history")?
            .insert_id()
        });

        Ok(ReviewHistoryEntry { id, ..entry.clone() })
    }

    async fn history_for(
        &self,
        user_id: i64,
        content_type: ReviewContentType,
        content_id: i64,
    ) -> Result<Vec<ReviewHistoryEntry>> {
        on_pool!(self.pool, |pool, Db| {
            let sql = format!(
                "SELECT {} FROM review_history WHERE user_id = ? AND content_type = ? AND content_id = ? \
                 ORDER BY reviewed_at DESC, id DESC",
                HISTORY_COLUMNS
            );
            let rows = sqlx::query(&sql)
                .bind(user_id)
                .bind(content_type.as_str())
                .bind(content_id)
                .fetch_all(pool)
                .await
                .context("Failed to list review history")?;
            rows.iter().map(row_to_history).collect()
        })
    }
}

fn read_grade(row: &impl DbRow) -> Result<Grade> {
    let raw = row.small("grade")?;
    u8::try_from(raw)
        .ok()
        .and_then(|value| Grade::try_from(value).ok())
        .ok_or_else(|| anyhow!("Invalid stored grade: {}", raw))
}

fn row_to_card(row: &impl DbRow) -> Result<FsrsCard> {
    Ok(FsrsCard {
        id: row.int("id")?,
        user_id: row.int("user_id")?,
        content_type: row.parsed("content_type")?,
        content_id: row.int("content_id")?,
        deck_id: row.opt_int("deck_id")?,
        subject: row.opt_text("subject")?,
        due: row.time("due")?,
        stability: row.float("stability")?,
        difficulty: row.float("difficulty")?,
        elapsed_days: row.int("elapsed_days")?,
        scheduled_days: row.int("scheduled_days")?,
        reps: row.int("reps")?,
        lapses: row.int("lapses")?,
        state: row.parsed("state")?,
        last_review: row.opt_time("last_review")?,
        created_at: row.time("created_at")?,
        updated_at: row.time("updated_at")?,
    })
}

fn row_to_log(row: &impl DbRow) -> Result<ReviewLog> {
    Ok(ReviewLog {
        id: row.int("id")?,
        card_id: row.int("card_id")?,
        grade: read_grade(row)?,
        state: row.parsed("state")?,
        due: row.time("due")?,
        stability: row.float("stability")?,
        difficulty: row.float("difficulty")?,
        elapsed_days: row.int("elapsed_days")?,
        last_elapsed_days: row.int("last_elapsed_days")?,
        scheduled_days: row.int("scheduled_days")?,
        review_time_ms: row.int("review_time_ms")?,
        reviewed_at: row.time("reviewed_at")?,
    })
}

fn row_to_history(row: &impl DbRow) -> Result<ReviewHistoryEntry> {
    Ok(ReviewHistoryEntry {
        id: row.int("id")?,
        user_id: row.int("user_id")?,
        card_id: row.int("card_id")?,
        content_type: row.parsed("content_type")?,
        content_id: row.int("content_id")?,
        grade: read_grade(row)?,
        state: row.parsed("state")?,
        stability: row.float("stability")?,
        difficulty: row.float("difficulty")?,
        scheduled_days: row.int("scheduled_days")?,
        review_time_ms: row.int("review_time_ms")?,
        reviewed_at: row.time("reviewed_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, migrated_pool};
    use crate::models::{CardState, DueCursor};
    use chrono::Duration;

    fn card(user_id: i64, content_id: i64, due: DateTime<Utc>) -> FsrsCard {
        let now = Utc::now();
        FsrsCard {
            id: 0,
            user_id,
            content_type: ReviewContentType::Flashcard,
            content_id,
            deck_id: Some(1),
            subject: Some("Cardiologia".into()),
            due,
            stability: 8.0,
            difficulty: 6.0,
            elapsed_days: 0,
            scheduled_days: 0,
            reps: 0,
            lapses: 0,
            state: CardState::New,
            last_review: None,
            created_at: now,
            updated_at: now,
        }
    }

    async fn setup_test_repo() -> (SqlxReviewRepository, i64) {
        let pool = migrated_pool().await;
        let user = insert_user(&pool, "revisor").await;
        (SqlxReviewRepository::new(pool), user)
    }

    #[tokio::test]
    async fn test_create_and_find_card() {
        let (repo, user) = setup_test_repo().await;
        let created = repo.create_card(&card(user, 10, Utc::now())).await.expect("Failed to create card");

        let found = repo
            .find_card(user, ReviewContentType::Flashcard, 10)
            .await
            .unwrap()
            .expect("Card not found");

        assert_eq!(found.id, created.id);
        assert_eq!(found.state, CardState::New);
        assert!(repo.find_card(user, ReviewContentType::Question, 10).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_card_is_unique_per_item() {
        let (repo, user) = setup_test_repo().await;
        repo.create_card(&card(user, 10, Utc::now())).await.unwrap();

        assert!(repo.create_card(&card(user, 10, Utc::now())).await.is_err());
    }

    #[tokio::test]
    async fn test_due_windows() {
        let (repo, user) = setup_test_repo().await;
        let now = Utc::now();
        repo.create_card(&card(user, 1, now - Duration::days(2))).await.unwrap();
        repo.create_card(&card(user, 2, now - Duration::hours(1))).await.unwrap();
        repo.create_card(&card(user, 3, now + Duration::days(3))).await.unwrap();

        let due = repo.cards_due_before(user, now, 200).await.unwrap();
        assert_eq!(due.iter().map(|c| c.content_id).collect::<Vec<_>>(), vec![1, 2]);

        let future = repo.cards_due_from(user, now + Duration::days(1), 200).await.unwrap();
        assert_eq!(future.len(), 1);

        let window = repo
            .cards_due_between(user, now - Duration::days(1), now + Duration::days(1))
            .await
            .unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].content_id, 2);
    }

    #[tokio::test]
    async fn test_cards_page_orders_by_due_then_id() {
        let (repo, user) = setup_test_repo().await;
        let now = Utc::now();
        // Insertion order differs from due order; the last two share a due date
        let later = repo.create_card(&card(user, 1, now + Duration::days(3))).await.unwrap();
        let earliest = repo.create_card(&card(user, 2, now - Duration::days(1))).await.unwrap();
        let tie = now - Duration::hours(2);
        let tie_a = repo.create_card(&card(user, 3, tie)).await.unwrap();
        let tie_b = repo.create_card(&card(user, 4, tie)).await.unwrap();

        let query = DueQuery {
            page_size: 2,
            due_only: false,
            ..Default::default()
        };
        let first = repo.cards_page(user, &query, now).await.unwrap();
        assert_eq!(
            first.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![earliest.id, tie_a.id, tie_b.id]
        );

        let next = DueQuery {
            cursor: Some(DueCursor::from(&first[1])),
            ..query
        };
        let second = repo.cards_page(user, &next, now).await.unwrap();
        assert_eq!(second.iter().map(|c| c.id).collect::<Vec<_>>(), vec![tie_b.id, later.id]);

        let due_only = DueQuery {
            page_size: 10,
            ..Default::default()
        };
        let due = repo.cards_page(user, &due_only, now).await.unwrap();
        assert_eq!(due.len(), 3);
        assert!(due.windows(2).all(|pair| pair[0].due <= pair[1].due));
    }

    #[tokio::test]
    async fn test_logs_and_history() {
        let (repo, user) = setup_test_repo().await;
        let now = Utc::now();
        let created = repo.create_card(&card(user, 7, now)).await.unwrap();

        repo.insert_log(&ReviewLog {
            id: 0,
            card_id: created.id,
            grade: Grade::Good,
            state: CardState::New,
            due: created.due,
            stability: created.stability,
            difficulty: created.difficulty,
            elapsed_days: 0,
            last_elapsed_days: 0,
            scheduled_days: 3,
            review_time_ms: 1200,
            reviewed_at: now,
        })
        .await
        .unwrap();
        repo.insert_history(&ReviewHistoryEntry {
            id: 0,
            user_id: user,
            card_id: created.id,
            content_type: ReviewContentType::Flashcard,
            content_id: 7,
            grade: Grade::Good,
            state: CardState::Learning,
            stability: 3.5,
            difficulty: 5.0,
            scheduled_days: 3,
            review_time_ms: 1200,
            reviewed_at: now,
        })
        .await
        .unwrap();

        let logs = repo.logs_for_card(created.id).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].grade, Grade::Good);

        let history = repo.history_for(user, ReviewContentType::Flashcard, 7).await.unwrap();
        assert_eq!(history[0].state, CardState::Learning);

        repo.delete_cards_for(ReviewContentType::Flashcard, 7).await.unwrap();
        assert!(repo.get_card(created.id).await.unwrap().is_none());
        assert!(repo.logs_for_card(created.id).await.unwrap().is_empty());
    }
}

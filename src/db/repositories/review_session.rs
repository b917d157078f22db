//! Review session repository

use super::{DbRow, InsertId};
use crate::db::DynDatabasePool;
use crate::models::{ReviewContentType, ReviewSession, ReviewSessionStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;

const SESSION_COLUMNS: &str = "id, user_id, content_type, review_ids, session_date, status, current_index, \
     total_items, started_at, completed_at, updated_at";

/// Review session repository trait
#[async_trait]
pub trait ReviewSessionRepository: Send + Sync {
    /// Session of a user for one content type and day
    async fn find(
        &self,
        user_id: i64,
        content_type: ReviewContentType,
        date: NaiveDate,
    ) -> Result<Option<ReviewSession>>;

    /// Insert an active session
    async fn create(
        &self,
        user_id: i64,
        content_type: ReviewContentType,
        review_ids: &[i64],
        date: NaiveDate,
    ) -> Result<ReviewSession>;

    /// Get session by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<ReviewSession>>;

    /// Move the cursor
    async fn update_progress(&self, id: i64, current_index: i32) -> Result<()>;

    /// Mark the session completed
    async fn complete(&self, id: i64, at: DateTime<Utc>) -> Result<()>;
}

/// SQLx-based review session repository implementation
pub struct SqlxReviewSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxReviewSessionRepository {
    /// Create a new SQLx review session repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ReviewSessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ReviewSessionRepository for SqlxReviewSessionRepository {
    async fn find(
        &self,
        user_id: i64,
        content_type: ReviewContentType,
        date: NaiveDate,
    ) -> Result<Option<ReviewSession>> {
        on_pool!(self.pool, |pool, Db| {
            let sql = format!(
                "SELECT {} FROM review_sessions WHERE user_id = ? AND content_type = ? AND session_date = ?",
                SESSION_COLUMNS
            );
            let row = sqlx::query(&sql)
                .bind(user_id)
                .bind(content_type.as_str())
                .bind(date)
                .fetch_optional(pool)
                .await
                .context("Failed to find review session")?;
            row.as_ref().map(row_to_session).transpose()
        })
    }

    async fn create(
        &self,
        user_id: i64,
        content_type: ReviewContentType,
        review_ids: &[i64],
        date: NaiveDate,
    ) -> Result<ReviewSession> {
        let now = Utc::now();
        let encoded = serde_json::to_string(review_ids).context("Failed to encode review ids")?;
        let id = on_pool!(self.pool, |pool, Db| {
            sqlx::query(
                r#"
                INSERT INTO review_sessions (user_id, content_type, review_ids, session_date, status, current_index,
                                             total_items, started_at, updated_at)
                VALUES (?, ?, ?, ?, ?, 0, ?, ?, ?)
                "#,
            )
            .bind(user_id)
            .bind(content_type.as_str())
            .bind(&encoded)
            .bind(date)
            .bind(ReviewSessionStatus::Active.as_str())
            .bind(review_ids.len() as i32)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create review session")?
            .insert_id()
        });

        self.get_by_id(id)
            .await?
            .context("Failed to fetch created review session")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ReviewSession>> {
        on_pool!(self.pool, |pool, Db| {
            let sql = format!("SELECT {} FROM review_sessions WHERE id = ?", SESSION_COLUMNS);
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get review session")?;
            row.as_ref().map(row_to_session).transpose()
        })
    }

    async fn update_progress(&self, id: i64, current_index: i32) -> Result<()> {
        on_pool!(self.pool, |pool, Db| {
            sqlx::query("UPDATE review_sessions SET current_index = ?, updated_at = ? WHERE id = ?")
                .bind(current_index)
                .bind(Utc::now())
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to update review session")?;
        });
        Ok(())
    }

    async fn complete(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        on_pool!(self.pool, |pool, Db| {
            sqlx::query("UPDATE review_sessions SET status = ?, completed_at = ?, updated_at = ? WHERE id = ?")
                .bind(ReviewSessionStatus::Completed.as_str())
                .bind(at)
                .bind(at)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to complete review session")?;
        });
        Ok(())
    }
}

fn row_to_session(row: &impl DbRow) -> Result<ReviewSession> {
    Ok(ReviewSession {
        id: row.int("id")?,
        user_id: row.int("user_id")?,
        content_type: row.parsed("content_type")?,
        review_ids: serde_json::from_str(&row.text("review_ids")?).unwrap_or_default(),
        session_date: row.date("session_date")?,
        status: row.parsed("status")?,
        current_index: row.small("current_index")?,
        total_items: row.small("total_items")?,
        started_at: row.time("started_at")?,
        completed_at: row.opt_time("completed_at")?,
        updated_at: row.time("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, migrated_pool};

    #[tokio::test]
    async fn test_session_lifecycle() {
        let pool = migrated_pool().await;
        let user = insert_user(&pool, "revisora").await;
        let repo = SqlxReviewSessionRepository::new(pool);
        let date = NaiveDate::from_ymd_opt(2026, 5, 4).unwrap();

        let created = repo
            .create(user, ReviewContentType::Question, &[4, 8, 15], date)
            .await
            .expect("Failed to create session");
        assert_eq!(created.total_items, 3);
        assert_eq!(created.review_ids, vec![4, 8, 15]);

        let found = repo.find(user, ReviewContentType::Question, date).await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(repo.find(user, ReviewContentType::Flashcard, date).await.unwrap().is_none());

        repo.update_progress(created.id, 2).await.unwrap();
        repo.complete(created.id, Utc::now()).await.unwrap();

        let done = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(done.current_index, 2);
        assert_eq!(done.status, ReviewSessionStatus::Completed);
        assert!(done.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_one_session_per_day() {
        let pool = migrated_pool().await;
        let user = insert_user(&pool, "revisora").await;
        let repo = SqlxReviewSessionRepository::new(pool);
        let date = NaiveDate::from_ymd_opt(2026, 5, 4).unwrap();

        repo.create(user, ReviewContentType::Flashcard, &[1], date).await.unwrap();
        assert!(repo.create(user, ReviewContentType::Flashcard, &[2], date).await.is_err());
    }
}

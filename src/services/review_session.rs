//! Review session service

use crate::db::repositories::ReviewSessionRepository;
use crate::models::{CreateReviewSessionInput, ReviewSession, ReviewSessionStatus};
use chrono::Utc;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ReviewSessionError {
    #[error("Review session not found: {0}")]
    NotFound(i64),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct ReviewSessionService {
    repo: Arc<dyn ReviewSessionRepository>,
}

impl ReviewSessionService {
    pub fn new(repo: Arc<dyn ReviewSessionRepository>) -> Self {
        Self { repo }
    }

    /// Resume the user's session for this type and day, or start one
    pub async fn get_or_create(
        &self,
        user_id: i64,
        input: CreateReviewSessionInput,
    ) -> Result<ReviewSession, ReviewSessionError> {
        let date = input.date.unwrap_or_else(|| Utc::now().date_naive());
        if let Some(existing) = self.repo.find(user_id, input.content_type, date).await? {
            return Ok(existing);
        }

        let session = self
            .repo
            .create(user_id, input.content_type, &input.review_ids, date)
            .await?;
        tracing::debug!(
            "Started {} review session {} with {} items for user {}",
            session.content_type,
            session.id,
            session.total_items,
            user_id
        );
        Ok(session)
    }

    pub async fn get(&self, user_id: i64, id: i64) -> Result<ReviewSession, ReviewSessionError> {
        let session = self
            .repo
            .get_by_id(id)
            .await?
            .ok_or(ReviewSessionError::NotFound(id))?;
        if session.user_id != user_id {
            return Err(ReviewSessionError::Forbidden(
                "Session belongs to another user".to_string(),
            ));
        }
        Ok(session)
    }

    /// Move the cursor, clamped to `0..=total_items`
    pub async fn update_progress(
        &self,
        user_id: i64,
        id: i64,
        current_index: i32,
    ) -> Result<ReviewSession, ReviewSessionError> {
        let mut session = self.get(user_id, id).await?;
        if session.status == ReviewSessionStatus::Completed {
            return Err(ReviewSessionError::ValidationError(
                "Session is already completed".to_string(),
            ));
        }

        session.current_index = current_index.clamp(0, session.total_items);
        self.repo.update_progress(id, session.current_index).await?;
        session.updated_at = Utc::now();
        Ok(session)
    }

    pub async fn complete(&self, user_id: i64, id: i64) -> Result<ReviewSession, ReviewSessionError> {
        let session = self.get(user_id, id).await?;
        if session.status == ReviewSessionStatus::Completed {
            return Ok(session);
        }
        self.repo.complete(id, Utc::now()).await?;
        self.get(user_id, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, migrated_pool};
    use crate::db::repositories::SqlxReviewSessionRepository;
    use crate::models::ReviewContentType;
    use chrono::NaiveDate;

    async fn setup() -> (ReviewSessionService, i64, i64) {
        let pool = migrated_pool().await;
        let user = insert_user(&pool, "revisora").await;
        let other = insert_user(&pool, "outra").await;
        (
            ReviewSessionService::new(SqlxReviewSessionRepository::boxed(pool)),
            user,
            other,
        )
    }

    fn input(ids: Vec<i64>) -> CreateReviewSessionInput {
        CreateReviewSessionInput {
            content_type: ReviewContentType::Flashcard,
            review_ids: ids,
            date: NaiveDate::from_ymd_opt(2026, 4, 10),
        }
    }

    #[tokio::test]
    async fn test_get_or_create_resumes() {
        let (service, user, _) = setup().await;

        let first = service.get_or_create(user, input(vec![3, 1, 2])).await.unwrap();
        assert_eq!(first.total_items, 3);
        assert_eq!(first.current_index, 0);
        assert_eq!(first.status, ReviewSessionStatus::Active);

        let again = service.get_or_create(user, input(vec![9])).await.unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(again.review_ids, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn test_progress_is_clamped_and_owner_only() {
        let (service, user, other) = setup().await;
        let session = service.get_or_create(user, input(vec![1, 2])).await.unwrap();

        assert!(matches!(
            service.get(other, session.id).await.unwrap_err(),
            ReviewSessionError::Forbidden(_)
        ));

        let moved = service.update_progress(user, session.id, 10).await.unwrap();
        assert_eq!(moved.current_index, 2);
        let moved = service.update_progress(user, session.id, -3).await.unwrap();
        assert_eq!(moved.current_index, 0);

        let done = service.complete(user, session.id).await.unwrap();
        assert_eq!(done.status, ReviewSessionStatus::Completed);
        assert!(done.completed_at.is_some());
        assert!(matches!(
            service.update_progress(user, session.id, 1).await.unwrap_err(),
            ReviewSessionError::ValidationError(_)
        ));
    }
}

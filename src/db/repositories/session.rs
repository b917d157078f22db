//! Session repository
//!
//! Database operations for login sessions.

use super::DbRow;
use crate::db::DynDatabasePool;
use crate::models::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Create a new session
    async fn create(&self, session: &Session) -> Result<Session>;

    /// Get session by ID (token)
    async fn get_by_id(&self, id: &str) -> Result<Option<Session>>;

    /// Delete a session
    async fn delete(&self, id: &str) -> Result<()>;

    /// Delete all sessions for a user
    async fn delete_by_user(&self, user_id: i64) -> Result<()>;

    /// Delete expired sessions, returning how many were removed
    async fn delete_expired(&self) -> Result<i64>;
}

/// SQLx-based session repository implementation
pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    /// Create a new SQLx session repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        on_pool!(self.pool, |pool, Db| {
            sqlx::query("INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)")
                .bind(&session.id)
                .bind(session.user_id)
                .bind(session.expires_at)
                .bind(session.created_at)
                .execute(pool)
                .await
                .context("Failed to create session")?;
        });
        Ok(session.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        on_pool!(self.pool, |pool, Db| {
            let row = sqlx::query("SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get session")?;
            row.as_ref().map(row_to_session).transpose()
        })
    }

    async fn delete(&self, id: &str) -> Result<()> {
        on_pool!(self.pool, |pool, Db| {
            sqlx::query("DELETE FROM sessions WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete session")?;
        });
        Ok(())
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<()> {
        on_pool!(self.pool, |pool, Db| {
            sqlx::query("DELETE FROM sessions WHERE user_id = ?")
                .bind(user_id)
                .execute(pool)
                .await
                .context("Failed to delete user sessions")?;
        });
        Ok(())
    }

    async fn delete_expired(&self) -> Result<i64> {
        on_pool!(self.pool, |pool, Db| {
            let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
                .bind(Utc::now())
                .execute(pool)
                .await
                .context("Failed to delete expired sessions")?;
            Ok(result.rows_affected() as i64)
        })
    }
}

fn row_to_session(row: &impl DbRow) -> Result<Session> {
    Ok(Session {
        id: row.text("id")?,
        user_id: row.int("user_id")?,
        expires_at: row.time("expires_at")?,
        created_at: row.time("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, migrated_pool};
    use chrono::Duration;

    async fn setup_test_repo() -> (DynDatabasePool, SqlxSessionRepository, i64) {
        let pool = migrated_pool().await;
        let user_id = insert_user(&pool, "session_user").await;
        let repo = SqlxSessionRepository::new(pool.clone());
        (pool, repo, user_id)
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let (_pool, repo, user_id) = setup_test_repo().await;
        let session = Session::new(user_id, Duration::days(7));

        repo.create(&session).await.expect("Failed to create session");
        let found = repo
            .get_by_id(&session.id)
            .await
            .expect("Failed to get session")
            .expect("Session not found");

        assert_eq!(found.user_id, user_id);
        assert!(!found.is_expired());
    }

    #[tokio::test]
    async fn test_delete_session() {
        let (_pool, repo, user_id) = setup_test_repo().await;
        let session = Session::new(user_id, Duration::days(7));
        repo.create(&session).await.unwrap();

        repo.delete(&session.id).await.unwrap();

        assert!(repo.get_by_id(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_sessions_by_user() {
        let (_pool, repo, user_id) = setup_test_repo().await;
        let first = Session::new(user_id, Duration::days(7));
        let second = Session::new(user_id, Duration::days(7));
        repo.create(&first).await.unwrap();
        repo.create(&second).await.unwrap();

        repo.delete_by_user(user_id).await.unwrap();

        assert!(repo.get_by_id(&first.id).await.unwrap().is_none());
        assert!(repo.get_by_id(&second.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_expired_sessions() {
        let (_pool, repo, user_id) = setup_test_repo().await;
        let expired = Session::new(user_id, Duration::days(-1));
        let valid = Session::new(user_id, Duration::days(1));
        repo.create(&expired).await.unwrap();
        repo.create(&valid).await.unwrap();

        let removed = repo.delete_expired().await.unwrap();

        assert_eq!(removed, 1);
        assert!(repo.get_by_id(&valid.id).await.unwrap().is_some());
    }
}

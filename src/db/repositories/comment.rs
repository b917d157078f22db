//! Comment repository
//!
//! Database operations for comments on content and for likes on both
//! content and comments.

use super::{DbRow, InsertId};
use crate::db::DynDatabasePool;
use crate::models::{Comment, CommentStatus, CommentWithMeta, LikeTargetType};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Insert a comment
    async fn create(
        &self,
        content_id: i64,
        user_id: i64,
        parent_id: Option<i64>,
        body: &str,
        status: CommentStatus,
    ) -> Result<Comment>;

    /// Get comment by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// Approved comments of a content, oldest first, joined with their authors
    async fn list_by_content(&self, content_id: i64) -> Result<Vec<CommentWithMeta>>;

    /// Number of comments in the subtree rooted at `id`, itself included
    async fn count_thread(&self, id: i64) -> Result<i64>;

    /// Delete a comment; replies cascade
    async fn delete(&self, id: i64) -> Result<()>;

    /// Change moderation status
    async fn update_status(&self, id: i64, status: CommentStatus) -> Result<()>;

    /// Add `delta` to a comment's like counter
    async fn adjust_like_count(&self, id: i64, delta: i64) -> Result<()>;

    /// Whether the user already liked the target
    async fn has_liked(&self, user_id: i64, target_type: LikeTargetType, target_id: i64) -> Result<bool>;

    /// Record a like; returns false when it already existed
    async fn add_like(&self, user_id: i64, target_type: LikeTargetType, target_id: i64) -> Result<bool>;

    /// Remove a like; returns false when there was none
    async fn remove_like(&self, user_id: i64, target_type: LikeTargetType, target_id: i64) -> Result<bool>;

    /// Drop the likes on a content and on all of its comments
    async fn delete_likes_for_content(&self, content_id: i64) -> Result<u64>;
}

/// SQLx-based comment repository implementation
pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    /// Create a new SQLx comment repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(
        &self,
        content_id: i64,
        user_id: i64,
        parent_id: Option<i64>,
        body: &str,
        status: CommentStatus,
    ) -> Result<Comment> {
        let id = on_pool!(self.pool, |pool, Db| {
            sqlx::query(
                r#"
                INSERT INTO comments (content_id, user_id, parent_id, body, status, like_count, created_at)
                VALUES (?, ?, ?, ?, ?, 0, ?)
                "#,
            )
            .bind(content_id)
            .bind(user_id)
            .bind(parent_id)
            .bind(body)
            .bind(status.as_str())
            .bind(Utc::now())
            .execute(pool)
            .await
            .context("Failed to create comment")?
            .insert_id()
        });

        self.get_by_id(id)
            .await?
            .context("Failed to fetch created comment")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        on_pool!(self.pool, |pool, Db| {
            let row = sqlx::query(
                "SELECT id, content_id, user_id, parent_id, body, status, like_count, created_at FROM comments WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get comment")?;
            row.as_ref().map(row_to_comment).transpose()
        })
    }

    async fn list_by_content(&self, content_id: i64) -> Result<Vec<CommentWithMeta>> {
        on_pool!(self.pool, |pool, Db| {
            let rows = sqlx::query(
                r#"
                SELECT c.id, c.content_id, c.user_id, c.parent_id, c.body, c.status, c.like_count, c.created_at,
                       u.username, u.display_name, u.email
                FROM comments c
                JOIN users u ON u.id = c.user_id
                WHERE c.content_id = ? AND c.status = ?
                ORDER BY c.created_at ASC, c.id ASC
                "#,
            )
            .bind(content_id)
            .bind(CommentStatus::Approved.as_str())
            .fetch_all(pool)
            .await
            .context("Failed to list comments")?;

            rows.iter()
                .map(|row| {
                    let author_name = row
                        .opt_text("display_name")?
                        .filter(|name| !name.trim().is_empty())
                        .map_or_else(|| row.text("username"), Ok)?;
                    Ok(CommentWithMeta {
                        comment: row_to_comment(row)?,
                        author_name,
                        avatar_url: CommentWithMeta::gravatar_url(&row.text("email")?),
                        replies: Vec::new(),
                    })
                })
                .collect()
        })
    }

    async fn count_thread(&self, id: i64) -> Result<i64> {
        on_pool!(self.pool, |pool, Db| {
            let row = sqlx::query(
                r#"
                WITH RECURSIVE thread(id) AS (
                    SELECT id FROM comments WHERE id = ?
                    UNION ALL
                    SELECT c.id FROM comments c JOIN thread t ON c.parent_id = t.id
                )
                SELECT COUNT(*) AS count FROM thread
                "#,
            )
            .bind(id)
            .fetch_one(pool)
            .await
            .context("Failed to count comment thread")?;
            row.int("count")
        })
    }

    async fn delete(&self, id: i64) -> Result<()> {
        on_pool!(self.pool, |pool, Db| {
            sqlx::query("DELETE FROM comments WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete comment")?;
        });
        Ok(())
    }

    async fn update_status(&self, id: i64, status: CommentStatus) -> Result<()> {
        on_pool!(self.pool, |pool, Db| {
            sqlx::query("UPDATE comments SET status = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to update comment status")?;
        });
        Ok(())
    }

    async fn adjust_like_count(&self, id: i64, delta: i64) -> Result<()> {
        on_pool!(self.pool, |pool, Db| {
            sqlx::query(
                "UPDATE comments SET like_count = CASE WHEN like_count + ? < 0 THEN 0 ELSE like_count + ? END WHERE id = ?",
            )
            .bind(delta)
            .bind(delta)
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to update comment likes")?;
        });
        Ok(())
    }

    async fn has_liked(&self, user_id: i64, target_type: LikeTargetType, target_id: i64) -> Result<bool> {
        on_pool!(self.pool, |pool, Db| {
            let row = sqlx::query(
                "SELECT COUNT(*) AS count FROM likes WHERE user_id = ? AND target_type = ? AND target_id = ?",
            )
            .bind(user_id)
            .bind(target_type.as_str())
            .bind(target_id)
            .fetch_one(pool)
            .await
            .context("Failed to check like")?;
            Ok(row.int("count")? > 0)
        })
    }

    async fn add_like(&self, user_id: i64, target_type: LikeTargetType, target_id: i64) -> Result<bool> {
        if self.has_liked(user_id, target_type, target_id).await? {
            return Ok(false);
        }
        on_pool!(self.pool, |pool, Db| {
            sqlx::query("INSERT INTO likes (user_id, target_type, target_id, created_at) VALUES (?, ?, ?, ?)")
                .bind(user_id)
                .bind(target_type.as_str())
                .bind(target_id)
                .bind(Utc::now())
                .execute(pool)
                .await
                .context("Failed to add like")?;
        });
        Ok(true)
    }

    async fn remove_like(&self, user_id: i64, target_type: LikeTargetType, target_id: i64) -> Result<bool> {
        on_pool!(self.pool, |pool, Db| {
            let result = sqlx::query("DELETE FROM likes WHERE user_id = ? AND target_type = ? AND target_id = ?")
                .bind(user_id)
                .bind(target_type.as_str())
                .bind(target_id)
                .execute(pool)
                .await
                .context("Failed to remove like")?;
            Ok(result.rows_affected() > 0)
        })
    }

    async fn delete_likes_for_content(&self, content_id: i64) -> Result<u64> {
        on_pool!(self.pool, |pool, Db| {
            let result = sqlx::query(
                r#"
                DELETE FROM likes
                WHERE (target_type = ? AND target_id = ?)
                   OR (target_type = ? AND target_id IN (SELECT id FROM comments WHERE content_id = ?))
                "#,
            )
            .bind(LikeTargetType::Content.as_str())
            .bind(content_id)
            .bind(LikeTargetType::Comment.as_str())
            .bind(content_id)
            .execute(pool)
            .await
            .context("Failed to delete content likes")?;
            Ok(result.rows_affected())
        })
    }
}

fn row_to_comment(row: &impl DbRow) -> Result<Comment> {
    Ok(Comment {
        id: row.int("id")?,
        content_id: row.int("content_id")?,
        user_id: row.int("user_id")?,
        parent_id: row.opt_int("parent_id")?,
        body: row.text("body")?,
        status: row.parsed("status")?,
        like_count: row.int("like_count")?,
        created_at: row.time("created_at")?,
    })
}

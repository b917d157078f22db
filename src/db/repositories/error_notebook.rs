//! Error notebook repository

use super::{tag_pattern, Conditions, DbRow, InsertId, SqlArg};
use crate::db::DynDatabasePool;
use crate::models::{encode_string_list, ErrorNotebookEntry, ErrorNotebookFilter};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

const ENTRY_COLUMNS: &str = "id, user_id, question_id, question_statement, correct_answer, subject, user_note, \
     user_explanation, key_points, tags, difficulty, confidence, is_in_review_system, review_count, \
     last_reviewed_at, created_at, updated_at";

/// Error notebook repository trait
#[async_trait]
pub trait ErrorNotebookRepository: Send + Sync {
    /// Insert an entry; `id` and timestamps on the argument are ignored
    async fn create(&self, entry: &ErrorNotebookEntry) -> Result<ErrorNotebookEntry>;

    /// Get entry by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<ErrorNotebookEntry>>;

    /// Filtered page of a user's entries, newest first, plus the total
    async fn list(&self, user_id: i64, filter: &ErrorNotebookFilter) -> Result<(Vec<ErrorNotebookEntry>, i64)>;

    /// Every entry of a user
    async fn list_all(&self, user_id: i64) -> Result<Vec<ErrorNotebookEntry>>;

    /// Persist editable fields
    async fn update(&self, entry: &ErrorNotebookEntry) -> Result<ErrorNotebookEntry>;

    /// Delete an entry
    async fn delete(&self, id: i64) -> Result<()>;

    /// Flag the entry as tracked by the review scheduler
    async fn mark_in_review(&self, id: i64) -> Result<()>;

    /// Bump the review counter and stamp the review time
    async fn record_review(&self, id: i64, reviewed_at: DateTime<Utc>) -> Result<()>;
}

/// SQLx-based error notebook repository implementation
pub struct SqlxErrorNotebookRepository {
    pool: DynDatabasePool,
}

impl SqlxErrorNotebookRepository {
    /// Create a new SQLx error notebook repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ErrorNotebookRepository> {
        Arc::new(Self::new(pool))
    }
}

fn filter_conditions(user_id: i64, filter: &ErrorNotebookFilter) -> Conditions {
    let mut conditions = Conditions::new();
    conditions.push("user_id = ?", [SqlArg::Int(user_id)]);
    if let Some(difficulty) = filter.difficulty {
        conditions.push("difficulty = ?", [SqlArg::Text(difficulty.as_str().to_string())]);
    }
    if let Some(in_review) = filter.is_in_review_system {
        conditions.push("is_in_review_system = ?", [SqlArg::Bool(in_review)]);
    }
    let tags: Vec<&str> = filter
        .tags
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    if !tags.is_empty() {
        let clause = format!("({})", vec!["tags LIKE ?"; tags.len()].join(" OR "));
        conditions.push(&clause, tags.iter().map(|t| SqlArg::Text(tag_pattern(t))));
    }
    conditions
}

#[async_trait]
impl ErrorNotebookRepository for SqlxErrorNotebookRepository {
    async fn create(&self, entry: &ErrorNotebookEntry) -> Result<ErrorNotebookEntry> {
        let now = Utc::now();
        let id = on_pool!(self.pool, |pool, Db| {
            sqlx::query(
                r#"
                INSERT INTO error_notebook_entries (user_id, question_id, question_statement, correct_answer,
                                                    subject, user_note, user_explanation, key_points, tags,
                                                    difficulty, confidence, is_in_review_system, review_count,
                                                    created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
                "#,
            )
            .bind(entry.user_id)
            .bind(entry.question_id)
            .bind(&entry.question_statement)
            .bind(&entry.correct_answer)
            .bind(&entry.subject)
            .bind(&entry.user_note)
            .bind(&entry.user_explanation)
            .bind(encode_string_list(&entry.key_points))
            .bind(encode_string_list(&entry.tags))
            .bind(entry.difficulty.as_str())
            .bind(entry.confidence)
            .bind(entry.is_in_review_system)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create error notebook entry")?
            .insert_id()
        });

        self.get_by_id(id)
            .await?
            .context("Failed to fetch created error notebook entry")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ErrorNotebookEntry>> {
        on_pool!(self.pool, |pool, Db| {
            let sql = format!("SELECT {} FROM error_notebook_entries WHERE id = ?", ENTRY_COLUMNS);
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get error notebook entry")?;
            row.as_ref().map(row_to_entry).transpose()
        })
    }

    async fn list(&self, user_id: i64, filter: &ErrorNotebookFilter) -> Result<(Vec<ErrorNotebookEntry>, i64)> {
        let conditions = filter_conditions(user_id, filter);
        let limit = filter.limit.clamp(1, 100) as i64;
        let offset = (filter.page.max(1) as i64 - 1) * limit;
        let count_sql = format!(
            "SELECT COUNT(*) AS count FROM error_notebook_entries {}",
            conditions.where_sql()
        );
        let list_sql = format!(
            "SELECT {} FROM error_notebook_entries {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            ENTRY_COLUMNS,
            conditions.where_sql()
        );

        on_pool!(self.pool, |pool, Db| {
            let total = bind_args!(sqlx::query::<Db>(&count_sql), conditions.args)
                .fetch_one(pool)
                .await
                .context("Failed to count error notebook entries")?
                .int("count")?;

            let rows = bind_args!(sqlx::query::<Db>(&list_sql), conditions.args)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await
                .context("Failed to list error notebook entries")?;

            let entries = rows.iter().map(row_to_entry).collect::<Result<Vec<_>>>()?;
            Ok((entries, total))
        })
    }

    async fn list_all(&self, user_id: i64) -> Result<Vec<ErrorNotebookEntry>> {
        on_pool!(self.pool, |pool, Db| {
            let sql = format!(
                "SELECT {} FROM error_notebook_entries WHERE user_id = ? ORDER BY created_at DESC, id DESC",
                ENTRY_COLUMNS
            );
            let rows = sqlx::query(&sql)
                .bind(user_id)
                .fetch_all(pool)
                .await
                .context("Failed to list error notebook entries")?;
            rows.iter().map(row_to_entry).collect()
        })
    }

    async fn update(&self, entry: &ErrorNotebookEntry) -> Result<ErrorNotebookEntry> {
        on_pool!(self.pool, |pool, Db| {
            sqlx::query(
                r#"
                UPDATE error_notebook_entries
                SET user_note = ?, user_explanation = ?, key_points = ?, tags = ?, difficulty = ?, confidence = ?,
                    updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&entry.user_note)
            .bind(&entry.user_explanation)
            .bind(encode_string_list(&entry.key_points))
            .bind(encode_string_list(&entry.tags))
            .bind(entry.difficulty.as_str())
            .bind(entry.confidence)
            .bind(Utc::now())
            .bind(entry.id)
            .execute(pool)
            .await
            .context("Failed to update error notebook entry")?;
        });

        self.get_by_id(entry.id)
            .await?
            .context("Failed to fetch updated error notebook entry")
    }

    async fn delete(&self, id: i64) -> Result<()> {
        on_pool!(self.pool, |pool, Db| {
            sqlx::query("DELETE FROM error_notebook_entries WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete error notebook entry")?;
        });
        Ok(())
    }

    async fn mark_in_review(&self, id: i64) -> Result<()> {
        on_pool!(self.pool, |pool, Db| {
            sqlx::query("UPDATE error_notebook_entries SET is_in_review_system = TRUE, updated_at = ? WHERE id = ?")
                .bind(Utc::now())
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to flag error notebook entry")?;
        });
        Ok(())
    }

    async fn record_review(&self, id: i64, reviewed_at: DateTime<Utc>) -> Result<()> {
        on_pool!(self.pool, |pool, Db| {
            sqlx::query(
                r#"
                UPDATE error_notebook_entries
                SET review_count = review_count + 1, last_reviewed_at = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(reviewed_at)
            .bind(reviewed_at)
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to record error notebook review")?;
        });
        Ok(())
    }
}

fn row_to_entry(row: &impl DbRow) -> Result<ErrorNotebookEntry> {
    Ok(ErrorNotebookEntry {
        id: row.int("id")?,
        user_id: row.int("user_id")?,
        question_id: row.int("question_id")?,
        question_statement: row.text("question_statement")?,
        correct_answer: row.opt_text("correct_answer")?,
        subject: row.opt_text("subject")?,
        user_note: row.text("user_note")?,
        user_explanation: row.text("user_explanation")?,
        key_points: row.list("key_points")?,
        tags: row.list("tags")?,
        difficulty: row.parsed("difficulty")?,
        confidence: row.small("confidence")?,
        is_in_review_system: row.flag("is_in_review_system")?,
        review_count: row.int("review_count")?,
        last_reviewed_at: row.opt_time("last_reviewed_at")?,
        created_at: row.time("created_at")?,
        updated_at: row.time("updated_at")?,
    })
}

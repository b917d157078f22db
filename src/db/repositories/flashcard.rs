//! Flashcard repository

use super::{DbRow, InsertId};
use crate::db::DynDatabasePool;
use crate::models::{encode_string_list, Flashcard};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

const FLASHCARD_COLUMNS: &str = "id, user_id, deck_id, front_content, back_content, personal_notes, tags, status, \
     created_at, updated_at";

/// Flashcard repository trait
#[async_trait]
pub trait FlashcardRepository: Send + Sync {
    /// Insert a flashcard; `id` and timestamps on the argument are ignored
    async fn create(&self, flashcard: &Flashcard) -> Result<Flashcard>;

    /// Get flashcard by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Flashcard>>;

    /// Flashcards of a deck, oldest first
    async fn list_by_deck(&self, deck_id: i64) -> Result<Vec<Flashcard>>;

    /// Persist editable fields
    async fn update(&self, flashcard: &Flashcard) -> Result<Flashcard>;

    /// Delete a flashcard
    async fn delete(&self, id: i64) -> Result<()>;
}

/// SQLx-based flashcard repository implementation
pub struct SqlxFlashcardRepository {
    pool: DynDatabasePool,
}

impl SqlxFlashcardRepository {
    /// Create a new SQLx flashcard repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn FlashcardRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl FlashcardRepository for SqlxFlashcardRepository {
    async fn create(&self, flashcard: &Flashcard) -> Result<Flashcard> {
        let now = Utc::now();
        let id = on_pool!(self.pool, |pool, Db| {
            sqlx::query(
                r#"
                INSERT INTO flashcards (user_id, deck_id, front_content, back_content, personal_notes, tags,
                                        status, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(flashcard.user_id)
            .bind(flashcard.deck_id)
            .bind(&flashcard.front_content)
            .bind(&flashcard.back_content)
            .bind(&flashcard.personal_notes)
            .bind(encode_string_list(&flashcard.tags))
            .bind(flashcard.status.as_str())
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create flashcard")?
            .insert_id()
        });

        self.get_by_id(id)
            .await?
            .context("Failed to fetch created flashcard")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Flashcard>> {
        on_pool!(self.pool, |pool, Db| {
            let sql = format!("SELECT {} FROM flashcards WHERE id = ?", FLASHCARD_COLUMNS);
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get flashcard")?;
            row.as_ref().map(row_to_flashcard).transpose()
        })
    }

    async fn list_by_deck(&self, deck_id: i64) -> Result<Vec<Flashcard>> {
        on_pool!(self.pool, |pool, Db| {
            let sql = format!(
                "SELECT {} FROM flashcards WHERE deck_id = ? ORDER BY created_at, id",
                FLASHCARD_COLUMNS
            );
            let rows = sqlx::query(&sql)
                .bind(deck_id)
                .fetch_all(pool)
                .await
                .context("Failed to list flashcards")?;
            rows.iter().map(row_to_flashcard).collect()
        })
    }

    async fn update(&self, flashcard: &Flashcard) -> Result<Flashcard> {
        on_pool!(self.pool, |pool, Db| {
            sqlx::query(
                r#"
                UPDATE flashcards
                SET front_content = ?, back_content = ?, personal_notes = ?, tags = ?, status = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&flashcard.front_content)
            .bind(&flashcard.back_content)
            .bind(&flashcard.personal_notes)
            .bind(encode_string_list(&flashcard.tags))
            .bind(flashcard.status.as_str())
            .bind(Utc::now())
            .bind(flashcard.id)
            .execute(pool)
            .await
            .context("Failed to update flashcard")?;
        });

        self.get_by_id(flashcard.id)
            .await?
            .context("Failed to fetch updated flashcard")
    }

    async fn delete(&self, id: i64) -> Result<()> {
        on_pool!(self.pool, |pool, Db| {
            sqlx::query("DELETE FROM flashcards WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete flashcard")?;
        });
        Ok(())
    }
}

fn row_to_flashcard(row: &impl DbRow) -> Result<Flashcard> {
    Ok(Flashcard {
        id: row.int("id")?,
        user_id: row.int("user_id")?,
        deck_id: row.int("deck_id")?,
        front_content: row.text("front_content")?,
        back_content: row.text("back_content")?,
        personal_notes: row.opt_text("personal_notes")?,
        tags: row.list("tags")?,
        status: row.parsed("status")?,
        created_at: row.time("created_at")?,
        updated_at: row.time("updated_at")?,
    })
}

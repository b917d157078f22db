//! Deck repository
//!
//! Database operations for flashcard decks and deck favorites.

use super::{contains_pattern, DbRow, InsertId};
use crate::db::DynDatabasePool;
use crate::models::{encode_string_list, Deck, DeckStats, DeckStatus, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;

const DECK_COLUMNS: &str = "d.id, d.user_id, d.name, d.description, d.is_public, d.tags, d.cover_image_url, \
     d.status, d.flashcard_count, d.created_at, d.updated_at";

/// Deck repository trait
#[async_trait]
pub trait DeckRepository: Send + Sync {
    /// Insert a deck; `id`, counters and timestamps on the argument are ignored
    async fn create(&self, deck: &Deck) -> Result<Deck>;

    /// Get deck by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Deck>>;

    /// A user's decks, most recently updated first
    async fn list_by_user(&self, user_id: i64, params: &ListParams) -> Result<(Vec<Deck>, i64)>;

    /// Active public decks of every user, most recently updated first
    async fn list_public(&self, params: &ListParams) -> Result<(Vec<Deck>, i64)>;

    /// Name search over the user's own decks and public decks
    async fn search(&self, user_id: i64, query: &str, limit: i64) -> Result<Vec<Deck>>;

    /// Persist editable fields
    async fn update(&self, deck: &Deck) -> Result<Deck>;

    /// Delete a deck; flashcards and favorites cascade
    async fn delete(&self, id: i64) -> Result<()>;

    /// Whether the user marked the deck as favorite
    async fn is_favorite(&self, user_id: i64, deck_id: i64) -> Result<bool>;

    /// Mark or unmark a favorite
    async fn set_favorite(&self, user_id: i64, deck_id: i64, favorite: bool) -> Result<()>;

    /// Decks the user marked as favorite
    async fn list_favorites(&self, user_id: i64) -> Result<Vec<Deck>>;

    /// Distinct tags across the user's decks, sorted
    async fn list_tags(&self, user_id: i64) -> Result<Vec<String>>;

    /// Aggregated counts for the user's decks
    async fn stats(&self, user_id: i64) -> Result<DeckStats>;

    /// Add `delta` to the cached flashcard count
    async fn adjust_flashcard_count(&self, deck_id: i64, delta: i64) -> Result<()>;

    /// Recount the deck's flashcards and store the result
    async fn recalculate_flashcard_count(&self, deck_id: i64) -> Result<i64>;
}

/// SQLx-based deck repository implementation
pub struct SqlxDeckRepository {
    pool: DynDatabasePool,
}

impl SqlxDeckRepository {
    /// Create a new SQLx deck repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn DeckRepository> {
        Arc::new(Self::new(pool))
    }

    async fn count_where(&self, sql: &str, user_id: Option<i64>) -> Result<i64> {
        on_pool!(self.pool, |pool, Db| {
            let mut query = sqlx::query::<Db>(sql);
            if let Some(user_id) = user_id {
                query = query.bind(user_id);
            }
            let row = query.fetch_one(pool).await.context("Failed to count decks")?;
            row.int("count")
        })
    }
}

#[async_trait]
impl DeckRepository for SqlxDeckRepository {
    async fn create(&self, deck: &Deck) -> Result<Deck> {
        let now = Utc::now();
        let id = on_pool!(self.pool, |pool, Db| {
            sqlx::query(
                r#"
                INSERT INTO decks (user_id, name, description, is_public, tags, cover_image_url, status,
                                   flashcard_count, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
                "#,
            )
            .bind(deck.user_id)
            .bind(&deck.name)
            .bind(&deck.description)
            .bind(deck.is_public)
            .bind(encode_string_list(&deck.tags))
            .bind(&deck.cover_image_url)
            .bind(deck.status.as_str())
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create deck")?
            .insert_id()
        });

        self.get_by_id(id).await?.context("Failed to fetch created deck")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Deck>> {
        on_pool!(self.pool, |pool, Db| {
            let sql = format!("SELECT {} FROM decks d WHERE d.id = ?", DECK_COLUMNS);
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get deck")?;
            row.as_ref().map(row_to_deck).transpose()
        })
    }

    async fn list_by_user(&self, user_id: i64, params: &ListParams) -> Result<(Vec<Deck>, i64)> {
        let total = self
            .count_where("SELECT COUNT(*) AS count FROM decks WHERE user_id = ?", Some(user_id))
            .await?;
        let decks = on_pool!(self.pool, |pool, Db| {
            let sql = format!(
                "SELECT {} FROM decks d WHERE d.user_id = ? ORDER BY d.updated_at DESC, d.id DESC LIMIT ? OFFSET ?",
                DECK_COLUMNS
            );
            let rows = sqlx::query(&sql)
                .bind(user_id)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
                .context("Failed to list decks")?;
            rows.iter().map(row_to_deck).collect::<Result<Vec<_>>>()?
        });
        Ok((decks, total))
    }

    async fn list_public(&self, params: &ListParams) -> Result<(Vec<Deck>, i64)> {
        let total = self
            .count_where(
                "SELECT COUNT(*) AS count FROM decks WHERE is_public = TRUE AND status = 'ACTIVE'",
                None,
            )
            .await?;
        let decks = on_pool!(self.pool, |pool, Db| {
            let sql = format!(
                "SELECT {} FROM decks d WHERE d.is_public = TRUE AND d.status = ? \
                 ORDER BY d.updated_at DESC, d.id DESC LIMIT ? OFFSET ?",
                DECK_COLUMNS
            );
            let rows = sqlx::query(&sql)
                .bind(DeckStatus::Active.as_str())
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
                .context("Failed to list public decks")?;
            rows.iter().map(row_to_deck).collect::<Result<Vec<_>>>()?
        });
        Ok((decks, total))
    }

    async fn search(&self, user_id: i64, query: &str, limit: i64) -> Result<Vec<Deck>> {
        on_pool!(self.pool, |pool, Db| {
            let sql = format!(
                "SELECT {} FROM decks d WHERE (d.user_id = ? OR d.is_public = TRUE) AND LOWER(d.name) LIKE ? \
                 ORDER BY d.name LIMIT ?",
                DECK_COLUMNS
            );
            let rows = sqlx::query(&sql)
                .bind(user_id)
                .bind(contains_pattern(&query.to_lowercase()))
                .bind(limit)
                .fetch_all(pool)
                .await
                .context("Failed to search decks")?;
            rows.iter().map(row_to_deck).collect()
        })
    }

    async fn update(&self, deck: &Deck) -> Result<Deck> {
        on_pool!(self.pool, |pool, Db| {
            sqlx::query(
                r#"
                UPDATE decks
                SET name = ?, description = ?, is_public = ?, tags = ?, cover_image_url = ?, status = ?,
                    updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&deck.name)
            .bind(&deck.description)
            .bind(deck.is_public)
            .bind(encode_string_list(&deck.tags))
            .bind(&deck.cover_image_url)
            .bind(deck.status.as_str())
            .bind(Utc::now())
            .bind(deck.id)
            .execute(pool)
            .await
            .context("Failed to update deck")?;
        });

        self.get_by_id(deck.id).await?.context("Failed to fetch updated deck")
    }

    async fn delete(&self, id: i64) -> Result<()> {
        on_pool!(self.pool, |pool, Db| {
            sqlx::query("DELETE FROM decks WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete deck")?;
        });
        Ok(())
    }

    async fn is_favorite(&self, user_id: i64, deck_id: i64) -> Result<bool> {
        on_pool!(self.pool, |pool, Db| {
            let row = sqlx::query("SELECT COUNT(*) AS count FROM deck_favorites WHERE user_id = ? AND deck_id = ?")
                .bind(user_id)
                .bind(deck_id)
                .fetch_one(pool)
                .await
                .context("Failed to check favorite")?;
            Ok(row.int("count")? > 0)
        })
    }

    async fn set_favorite(&self, user_id: i64, deck_id: i64, favorite: bool) -> Result<()> {
        let exists = self.is_favorite(user_id, deck_id).await?;
        if exists == favorite {
            return Ok(());
        }
        on_pool!(self.pool, |pool, Db| {
            if favorite {
                sqlx::query("INSERT INTO deck_favorites (user_id, deck_id, created_at) VALUES (?, ?, ?)")
                    .bind(user_id)
                    .bind(deck_id)
                    .bind(Utc::now())
                    .execute(pool)
                    .await
                    .context("Failed to add favorite")?;
            } else {
                sqlx::query("DELETE FROM deck_favorites WHERE user_id = ? AND deck_id = ?")
                    .bind(user_id)
                    .bind(deck_id)
                    .execute(pool)
                    .await
                    .context("Failed to remove favorite")?;
            }
        });
        Ok(())
    }

    async fn list_favorites(&self, user_id: i64) -> Result<Vec<Deck>> {
        on_pool!(self.pool, |pool, Db| {
            let sql = format!(
                "SELECT {} FROM decks d JOIN deck_favorites f ON f.deck_id = d.id \
                 WHERE f.user_id = ? ORDER BY f.created_at DESC",
                DECK_COLUMNS
            );
            let rows = sqlx::query(&sql)
                .bind(user_id)
                .fetch_all(pool)
                .await
                .context("Failed to list favorite decks")?;
            rows.iter().map(row_to_deck).collect()
        })
    }

    async fn list_tags(&self, user_id: i64) -> Result<Vec<String>> {
        let tag_lists = on_pool!(self.pool, |pool, Db| {
            let rows = sqlx::query("SELECT tags FROM decks WHERE user_id = ?")
                .bind(user_id)
                .fetch_all(pool)
                .await
                .context("Failed to list deck tags")?;
            rows.iter().map(|row| row.list("tags")).collect::<Result<Vec<_>>>()?
        });

        let tags: BTreeSet<String> = tag_lists.into_iter().flatten().collect();
        Ok(tags.into_iter().collect())
    }

    async fn stats(&self, user_id: i64) -> Result<DeckStats> {
        on_pool!(self.pool, |pool, Db| {
            let decks = sqlx::query("SELECT COUNT(*) AS count FROM decks WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(pool)
                .await
                .context("Failed to count decks")?;

            let public = sqlx::query("SELECT COUNT(*) AS count FROM decks WHERE user_id = ? AND is_public = TRUE")
                .bind(user_id)
                .fetch_one(pool)
                .await
                .context("Failed to count public decks")?;

            let flashcards = sqlx::query("SELECT COUNT(*) AS count FROM flashcards WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(pool)
                .await
                .context("Failed to count flashcards")?;

            let favorites = sqlx::query("SELECT COUNT(*) AS count FROM deck_favorites WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(pool)
                .await
                .context("Failed to count favorites")?;

            Ok(DeckStats {
                total_decks: decks.int("count")?,
                public_decks: public.int("count")?,
                total_flashcards: flashcards.int("count")?,
                favorite_decks: favorites.int("count")?,
            })
        })
    }

    async fn adjust_flashcard_count(&self, deck_id: i64, delta: i64) -> Result<()> {
        on_pool!(self.pool, |pool, Db| {
            sqlx::query(
                r#"
                UPDATE decks
                SET flashcard_count = CASE WHEN flashcard_count + ? < 0 THEN 0 ELSE flashcard_count + ? END,
                    updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(delta)
            .bind(delta)
            .bind(Utc::now())
            .bind(deck_id)
            .execute(pool)
            .await
            .context("Failed to update flashcard count")?;
        });
        Ok(())
    }

    async fn recalculate_flashcard_count(&self, deck_id: i64) -> Result<i64> {
        on_pool!(self.pool, |pool, Db| {
            let count = sqlx::query("SELECT COUNT(*) AS count FROM flashcards WHERE deck_id = ?")
                .bind(deck_id)
                .fetch_one(pool)
                .await
                .context("Failed to count deck flashcards")?
                .int("count")?;

            sqlx::query("UPDATE decks SET flashcard_count = ? WHERE id = ?")
                .bind(count)
                .bind(deck_id)
                .execute(pool)
                .await
                .context("Failed to store flashcard count")?;
            Ok(count)
        })
    }
}

fn row_to_deck(row: &impl DbRow) -> Result<Deck> {
    Ok(Deck {
        id: row.int("id")?,
        user_id: row.int("user_id")?,
        name: row.text("name")?,
        description: row.opt_text("description")?,
        is_public: row.flag("is_public")?,
        tags: row.list("tags")?,
        cover_image_url: row.opt_text("cover_image_url")?,
        status: row.parsed("status")?,
        flashcard_count: row.int("flashcard_count")?,
        created_at: row.time("created_at")?,
        updated_at: row.time("updated_at")?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, migrated_pool};

    pub(crate) fn new_deck(user_id: i64, name: &str, is_public: bool, tags: &[&str]) -> Deck {
        let now = Utc::now();
        Deck {
            id: 0,
            user_id,
            name: name.to_string(),
            description: None,
            is_public,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            cover_image_url: None,
            status: DeckStatus::Active,
            flashcard_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    async fn setup_test_repo() -> (SqlxDeckRepository, i64, i64) {
        let pool = migrated_pool().await;
        let owner = insert_user(&pool, "dono").await;
        let other = insert_user(&pool, "outro").await;
        (SqlxDeckRepository::new(pool), owner, other)
    }

    #[tokio::test]
    async fn test_create_and_list_decks() {
        let (repo, owner, other) = setup_test_repo().await;
        repo.create(&new_deck(owner, "Cardio", true, &["cardio"])).await.expect("Failed to create deck");
        repo.create(&new_deck(owner, "Privado", false, &[])).await.unwrap();
        repo.create(&new_deck(other, "Neuro", true, &["neuro"])).await.unwrap();

        let (mine, total) = repo.list_by_user(owner, &ListParams::default()).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(mine.len(), 2);

        let (public, total) = repo.list_public(&ListParams::default()).await.unwrap();
        assert_eq!(total, 2);
        assert!(public.iter().all(|d| d.is_public));

        let found = repo.search(other, "card", 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(repo.search(other, "priv", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_favorites_and_stats() {
        let (repo, owner, _) = setup_test_repo().await;
        let deck = repo.create(&new_deck(owner, "Pneumo", true, &["pneumo", "clinica"])).await.unwrap();
        repo.create(&new_deck(owner, "Gastro", false, &["clinica"])).await.unwrap();

        repo.set_favorite(owner, deck.id, true).await.unwrap();
        repo.set_favorite(owner, deck.id, true).await.unwrap();
        assert!(repo.is_favorite(owner, deck.id).await.unwrap());
        assert_eq!(repo.list_favorites(owner).await.unwrap().len(), 1);

        let stats = repo.stats(owner).await.unwrap();
        assert_eq!(
            stats,
            DeckStats {
                total_decks: 2,
                public_decks: 1,
                total_flashcards: 0,
                favorite_decks: 1,
            }
        );
        assert_eq!(repo.list_tags(owner).await.unwrap(), vec!["clinica", "pneumo"]);

        repo.set_favorite(owner, deck.id, false).await.unwrap();
        assert!(!repo.is_favorite(owner, deck.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_flashcard_count_adjustments() {
        let (repo, owner, _) = setup_test_repo().await;
        let deck = repo.create(&new_deck(owner, "Renal", false, &[])).await.unwrap();

        repo.adjust_flashcard_count(deck.id, 2).await.unwrap();
        repo.adjust_flashcard_count(deck.id, -5).await.unwrap();
        assert_eq!(repo.get_by_id(deck.id).await.unwrap().unwrap().flashcard_count, 0);

        repo.adjust_flashcard_count(deck.id, 4).await.unwrap();
        assert_eq!(repo.recalculate_flashcard_count(deck.id).await.unwrap(), 0);
        assert_eq!(repo.get_by_id(deck.id).await.unwrap().unwrap().flashcard_count, 0);
    }
}
